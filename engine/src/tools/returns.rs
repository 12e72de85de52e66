//! Return-desk business rules
//!
//! Three capabilities over a fixed product and customer catalog:
//! eligibility checks, return-label generation and policy lookup. Expected
//! business outcomes (product outside its window, product not returnable)
//! are successful results; only bad input is an error.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdk::{Capability, CapabilityArgs, CapabilityError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::CapabilityId;
use crate::clock::Clock;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TRACKING_BASE_URL: &str = "https://ecotech.com/track";

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: &'static str,
    pub category: &'static str,
    pub price: f64,
    pub window_days: i64,
    pub returnable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: &'static str,
    pub email: &'static str,
    pub tier: &'static str,
}

/// Read-only product and customer data
#[derive(Debug, Clone)]
pub struct Catalog {
    products: BTreeMap<&'static str, Product>,
    customers: BTreeMap<&'static str, Customer>,
}

impl Catalog {
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn customer(&self, id: &str) -> Option<&Customer> {
        self.customers.get(id)
    }

    fn require_product(&self, id: &str) -> Result<&Product, CapabilityError> {
        self.product(id).ok_or_else(|| {
            CapabilityError::InvalidArgument(format!(
                "❌ Error: El producto {} no existe en nuestro sistema.",
                id
            ))
        })
    }

    fn require_customer(&self, id: &str) -> Result<&Customer, CapabilityError> {
        self.customer(id).ok_or_else(|| {
            CapabilityError::InvalidArgument(format!(
                "❌ Error: El cliente {} no existe en nuestro sistema.",
                id
            ))
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let products = BTreeMap::from([
            (
                "PROD001",
                Product {
                    name: "Smartphone EcoTech Pro",
                    category: "Electrónicos",
                    price: 299.99,
                    window_days: 30,
                    returnable: true,
                },
            ),
            (
                "PROD002",
                Product {
                    name: "Laptop EcoFriendly",
                    category: "Computadoras",
                    price: 899.99,
                    window_days: 15,
                    returnable: true,
                },
            ),
            (
                "PROD003",
                Product {
                    name: "Auriculares Wireless",
                    category: "Audio",
                    price: 79.99,
                    window_days: 14,
                    returnable: true,
                },
            ),
            (
                "PROD004",
                Product {
                    name: "Tablet EcoPad",
                    category: "Tablets",
                    price: 199.99,
                    window_days: 7,
                    returnable: false,
                },
            ),
        ]);

        let customers = BTreeMap::from([
            (
                "CLI001",
                Customer {
                    name: "Juan Pérez",
                    email: "juan@email.com",
                    tier: "premium",
                },
            ),
            (
                "CLI002",
                Customer {
                    name: "María García",
                    email: "maria@email.com",
                    tier: "estándar",
                },
            ),
            (
                "CLI003",
                Customer {
                    name: "Carlos López",
                    email: "carlos@email.com",
                    tier: "premium",
                },
            ),
        ]);

        Self {
            products,
            customers,
        }
    }
}

// ---------------------------------------------------------------------------
// check_eligibility
// ---------------------------------------------------------------------------

/// Checks whether a product can still be returned
pub struct EligibilityCheck {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
}

impl EligibilityCheck {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    fn parse_purchase_date(raw: &str) -> Result<NaiveDate, CapabilityError> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            CapabilityError::InvalidArgument(format!(
                "❌ Error: Formato de fecha inválido ('{}'). Use YYYY-MM-DD",
                raw
            ))
        })
    }

    fn additional_conditions(product: &Product, elapsed: i64) -> String {
        let mut notes = Vec::new();

        if (elapsed as f64) > (product.window_days as f64) * 0.8 {
            notes.push("⚠️ Nota: Está cerca del límite del período de devolución.");
        }
        if product.price > 500.0 {
            notes.push("💎 Producto de alto valor: Se requiere inspección adicional.");
        }

        if notes.is_empty() {
            "✅ Todas las condiciones cumplidas.".to_string()
        } else {
            notes.join("\n")
        }
    }
}

#[async_trait]
impl Capability for EligibilityCheck {
    fn name(&self) -> &str {
        CapabilityId::CheckEligibility.as_str()
    }

    fn description(&self) -> &str {
        "Verifica si un producto puede devolverse según su ID y fecha de compra (YYYY-MM-DD)."
    }

    fn params(&self) -> &[&'static str] {
        &["product_id", "purchase_date"]
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError> {
        let product_id = args.required(0, "product_id")?;
        let product = self.catalog.require_product(product_id)?;

        if !product.returnable {
            return Ok(format!(
                "❌ El producto {} ({}) no es elegible para devolución según nuestras políticas.",
                product.name, product_id
            ));
        }

        let purchase_date = Self::parse_purchase_date(args.required(1, "purchase_date")?)?;
        let today = self.clock.now().date();
        let elapsed = (today - purchase_date).num_days();
        debug!(
            "Eligibility for {}: purchased {}, {} days elapsed",
            product_id, purchase_date, elapsed
        );

        if elapsed < 0 {
            return Err(CapabilityError::InvalidArgument(format!(
                "❌ Error: La fecha de compra {} es posterior a la fecha actual ({}).",
                purchase_date, today
            )));
        }

        if elapsed > product.window_days {
            return Ok(format!(
                "❌ El producto {} ({}) ya no es elegible para devolución. \
                 Han transcurrido {} días desde la compra, pero el período de devolución es de {} días.",
                product.name, product_id, elapsed, product.window_days
            ));
        }

        info!("Product {} is eligible for return", product_id);
        Ok(format!(
            "✅ El producto {} ({}) ES ELEGIBLE para devolución.\n\
             📅 Días transcurridos: {}/{}\n\
             💰 Precio: ${:.2}\n\
             📦 Categoría: {}\n\
             {}",
            product.name,
            product_id,
            elapsed,
            product.window_days,
            product.price,
            product.category,
            Self::additional_conditions(product, elapsed)
        ))
    }
}

// ---------------------------------------------------------------------------
// generate_return_label
// ---------------------------------------------------------------------------

/// Return code of the form `DEV-<YYYYMMDDHHMMSS>-<4 chars>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnCode {
    pub issued_at: NaiveDateTime,
    pub suffix: String,
}

impl ReturnCode {
    /// Recover the timestamp and suffix from a rendered code
    pub fn parse(code: &str) -> Option<Self> {
        let rest = code.strip_prefix("DEV-")?;
        let (stamp, suffix) = rest.split_once('-')?;

        if stamp.len() != 14 || suffix.len() != 4 {
            return None;
        }
        if !suffix.bytes().all(|b| CODE_CHARSET.contains(&b)) {
            return None;
        }

        let issued_at = NaiveDateTime::parse_from_str(stamp, CODE_TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            issued_at,
            suffix: suffix.to_string(),
        })
    }

    pub fn tracking_url(&self) -> String {
        format!("{}/{}", TRACKING_BASE_URL, self)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DEV-{}-{}",
            self.issued_at.format(CODE_TIMESTAMP_FORMAT),
            self.suffix
        )
    }
}

/// Issues return labels with a unique tracking code
pub struct LabelGenerator {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl LabelGenerator {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(catalog, clock, StdRng::from_entropy())
    }

    /// Use a caller-supplied generator, e.g. a seeded one in tests
    pub fn with_rng(catalog: Arc<Catalog>, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            catalog,
            clock,
            rng: Mutex::new(rng),
        }
    }

    fn issue_code(&self, issued_at: NaiveDateTime) -> Result<ReturnCode, CapabilityError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CapabilityError::Internal("generador de códigos no disponible".to_string()))?;

        let suffix = (0..4)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();

        Ok(ReturnCode { issued_at, suffix })
    }
}

#[async_trait]
impl Capability for LabelGenerator {
    fn name(&self) -> &str {
        CapabilityId::GenerateLabel.as_str()
    }

    fn description(&self) -> &str {
        "Genera una etiqueta de devolución para un producto y cliente específicos."
    }

    fn params(&self) -> &[&'static str] {
        &["product_id", "customer_id"]
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError> {
        let product_id = args.required(0, "product_id")?;
        let product = self.catalog.require_product(product_id)?;
        let customer_id = args.required(1, "customer_id")?;
        let customer = self.catalog.require_customer(customer_id)?;

        let now = self.clock.now();
        let code = self.issue_code(now)?;
        info!("Generated return label {}", code);

        Ok(format!(
            "🏷️ ETIQUETA DE DEVOLUCIÓN GENERADA\n\
             =====================================\n\
             \n\
             📋 Información de la Devolución:\n\
             • Código de Devolución: {code}\n\
             • Producto: {product} ({product_id})\n\
             • Cliente: {customer} ({customer_id})\n\
             • Fecha de Generación: {generated}\n\
             \n\
             📦 Instrucciones de Empaque:\n\
             1. Envuelva el producto en su empaque original si está disponible\n\
             2. Incluya todos los accesorios y manuales\n\
             3. Use una caja resistente para el envío\n\
             4. Pegue esta etiqueta en el exterior del paquete\n\
             \n\
             🚚 Información de Envío:\n\
             • Dirección de Retorno: EcoTech Returns Center, Calle Verde 123, Ciudad Eco\n\
             • Código Postal: ECO-001\n\
             • Teléfono de Contacto: +1-800-ECO-TECH\n\
             \n\
             ⚠️ Notas Importantes:\n\
             • El reembolso se procesará dentro de 5-7 días hábiles después de recibir el producto\n\
             • Mantenga este código de devolución para seguimiento\n\
             • Para consultas, contacte: soporte@ecotech.com\n\
             \n\
             🔗 Enlace de Seguimiento: {tracking}",
            code = code,
            product = product.name,
            product_id = product_id,
            customer = customer.name,
            customer_id = customer_id,
            generated = now.format("%Y-%m-%d %H:%M:%S"),
            tracking = code.tracking_url(),
        ))
    }
}

// ---------------------------------------------------------------------------
// lookup_return_policy
// ---------------------------------------------------------------------------

const GENERAL_POLICY: &str = "\
📋 POLÍTICAS GENERALES DE DEVOLUCIÓN
====================================

⏰ Períodos de Devolución:
• Electrónicos: 30 días
• Computadoras: 15 días
• Audio: 14 días
• Tablets: 7 días

✅ Condiciones para Devolución:
• Producto en estado original
• Empaque y accesorios incluidos
• Recibo de compra válido
• No haber sido usado excesivamente

❌ Productos No Elegibles:
• Productos personalizados
• Software con licencia activada
• Productos de higiene personal
• Alimentos perecederos

💰 Proceso de Reembolso:
• Reembolso completo si cumple condiciones
• Procesamiento en 5-7 días hábiles
• Mismo método de pago original";

const CATEGORY_NOTES: &[(&str, &str)] = &[
    (
        "Electrónicos",
        "📱 Electrónicos: Garantía extendida de 30 días, incluye smartphones, tablets y dispositivos móviles.",
    ),
    (
        "Computadoras",
        "💻 Computadoras: Garantía de 15 días, incluye laptops, desktops y componentes.",
    ),
    (
        "Audio",
        "🎧 Audio: Garantía de 14 días, incluye auriculares, altavoces y equipos de sonido.",
    ),
    (
        "Tablets",
        "📱 Tablets: Garantía de 7 días, dispositivos táctiles y tablets.",
    ),
];

/// Returns the general return policy, optionally with a category note
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyLookup;

impl PolicyLookup {
    /// Case-insensitive match against the known categories
    pub fn category_note(category: &str) -> Option<&'static str> {
        let wanted = category.to_lowercase();
        CATEGORY_NOTES
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, note)| *note)
    }
}

#[async_trait]
impl Capability for PolicyLookup {
    fn name(&self) -> &str {
        CapabilityId::PolicyLookup.as_str()
    }

    fn description(&self) -> &str {
        "Consulta las políticas de devolución, opcionalmente para una categoría \
         (Electrónicos, Computadoras, Audio, Tablets)."
    }

    fn params(&self) -> &[&'static str] {
        &["category"]
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError> {
        let Some(category) = args.optional(0) else {
            return Ok(GENERAL_POLICY.to_string());
        };

        debug!("Policy lookup for category {}", category);
        let note = match Self::category_note(category) {
            Some(note) => note.to_string(),
            None => format!(
                "❓ Categoría '{}' no encontrada. Consulte las categorías disponibles.",
                category
            ),
        };
        Ok(format!("{}\n\n{}", GENERAL_POLICY, note))
    }
}
