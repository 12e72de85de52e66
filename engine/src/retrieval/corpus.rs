//! Document corpus
//!
//! The built-in knowledge base plus any `.txt` / `.json` files found in the
//! configured data directory. Loaded once at startup and never mutated.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::Document;

const POLITICAS_DEVOLUCION: &str = "\
POLÍTICAS DE DEVOLUCIÓN ECOAGENT

Períodos de Devolución:
- Electrónicos: 30 días desde la compra
- Computadoras: 15 días desde la compra
- Audio: 14 días desde la compra
- Tablets: 7 días desde la compra

Condiciones Requeridas:
1. Producto en estado original
2. Empaque y accesorios incluidos
3. Recibo de compra válido
4. No haber sido usado excesivamente

Proceso de Devolución:
1. Verificar elegibilidad del producto
2. Generar etiqueta de devolución
3. Enviar producto a centro de retornos
4. Procesar reembolso en 5-7 días hábiles

Excepciones:
- Productos personalizados no son elegibles
- Software con licencia activada no es elegible
- Productos de higiene personal no son elegibles";

const PROCEDIMIENTOS_CALIDAD: &str = "\
PROCEDIMIENTOS DE CONTROL DE CALIDAD

Inspección de Productos Devueltos:
1. Verificar estado físico del producto
2. Comprobar que todos los accesorios estén incluidos
3. Verificar que el producto funcione correctamente
4. Documentar cualquier daño o defecto

Criterios de Aceptación:
- Producto sin daños visibles
- Funcionalidad completa
- Accesorios originales incluidos
- Empaque en buen estado

Proceso de Reembolso:
- Reembolso completo si cumple criterios
- Reembolso parcial si hay daños menores
- Sin reembolso si hay daños mayores";

const INFORMACION_PRODUCTOS: &str = "\
INFORMACIÓN DE PRODUCTOS ECOAGENT

Categorías de Productos:

Electrónicos:
- Smartphones EcoTech Pro (PROD001)
- Tablets EcoPad (PROD004)
- Dispositivos IoT EcoSmart

Computadoras:
- Laptops EcoFriendly (PROD002)
- Desktops EcoWorkstation
- Accesorios EcoAccessories

Audio:
- Auriculares Wireless (PROD003)
- Altavoces EcoSound
- Sistemas de audio EcoAudio

Especificaciones Técnicas:
- Todos los productos son eco-friendly
- Certificación de sostenibilidad
- Garantía extendida disponible
- Soporte técnico 24/7";

const SOPORTE_CLIENTE: &str = "\
SOPORTE AL CLIENTE ECOAGENT

Canales de Contacto:
- Email: soporte@ecotech.com
- Teléfono: +1-800-ECO-TECH
- Chat en vivo: Disponible 24/7
- Centro de ayuda: help.ecotech.com

Servicios Disponibles:
- Consultas sobre devoluciones
- Soporte técnico
- Información de productos
- Seguimiento de pedidos

Tiempos de Respuesta:
- Email: 2-4 horas
- Teléfono: Inmediato
- Chat: Inmediato
- Tickets: 1-2 horas";

/// The four built-in knowledge-base documents, in fixed order
pub fn knowledge_base() -> Vec<Document> {
    [
        ("politicas_devolucion", POLITICAS_DEVOLUCION),
        ("procedimientos_calidad", PROCEDIMIENTOS_CALIDAD),
        ("informacion_productos", INFORMACION_PRODUCTOS),
        ("soporte_cliente", SOPORTE_CLIENTE),
    ]
    .into_iter()
    .map(|(key, content)| {
        let source = format!("knowledge_base/{}", key);
        Document::new(source.clone(), content)
            .with_tag("source", source)
            .with_tag("type", "policy")
    })
    .collect()
}

/// Load `.txt` and `.json` documents from `dir`, in file-name order.
///
/// A missing directory yields no documents. Unreadable or malformed files are
/// skipped with a warning.
pub fn load_dir(dir: &Path) -> Vec<Document> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No extra corpus loaded from {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let source_id = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let loaded = match extension.as_deref() {
            Some("txt") => fs::read_to_string(&path)
                .map(|content| Document::new(&source_id, content).with_tag("type", "text"))
                .map_err(|e| e.to_string()),
            Some("json") => fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<serde_json::Value>(&raw).map_err(|e| e.to_string())
                })
                .and_then(|value| {
                    serde_json::to_string_pretty(&value).map_err(|e| e.to_string())
                })
                .map(|content| Document::new(&source_id, content).with_tag("type", "json")),
            _ => continue,
        };

        match loaded {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Could not load {:?}: {}", path, e),
        }
    }

    info!("Loaded {} documents from {:?}", documents.len(), dir);
    documents
}

/// Built-in knowledge base followed by the data-directory documents
pub fn load_corpus(data_dir: &Path) -> Vec<Document> {
    let mut documents = knowledge_base();
    documents.extend(load_dir(data_dir));
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_knowledge_base_shape() {
        let docs = knowledge_base();
        assert_eq!(docs.len(), 4);
        assert_eq!(docs[0].source_id, "knowledge_base/politicas_devolucion");
        assert!(docs
            .iter()
            .all(|d| d.tags.get("type").map(String::as_str) == Some("policy")));
        for doc in &docs {
            assert_eq!(doc.tags.get("source"), Some(&doc.source_id));
        }
        assert_eq!(
            docs[2].tags.get("source").map(String::as_str),
            Some("knowledge_base/informacion_productos")
        );
        assert!(docs[3].content.contains("soporte@ecotech.com"));
    }

    #[test]
    fn test_missing_dir_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_dir(&temp_dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_load_dir_txt_and_json_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b_faq.json"), r#"{"pregunta": "envío", "respuesta": "gratis"}"#)
            .unwrap();
        fs::write(temp_dir.path().join("a_notas.txt"), "Notas de devolución").unwrap();
        fs::write(temp_dir.path().join("c_broken.json"), "{not json").unwrap();
        fs::write(temp_dir.path().join("d_image.png"), [0u8, 1, 2]).unwrap();

        let docs = load_dir(temp_dir.path());
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source_id.ends_with("a_notas.txt"));
        assert_eq!(docs[0].tags.get("type").map(String::as_str), Some("text"));
        assert!(docs[1].source_id.ends_with("b_faq.json"));
        assert!(docs[1].content.contains("\"respuesta\": \"gratis\""));
    }

    #[test]
    fn test_load_corpus_puts_knowledge_base_first() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("extra.txt"), "extra").unwrap();

        let docs = load_corpus(temp_dir.path());
        assert_eq!(docs.len(), 5);
        assert!(docs[0].source_id.starts_with("knowledge_base/"));
        assert!(docs[4].source_id.ends_with("extra.txt"));
    }
}
