//! PDF merging functionality using lopdf

use std::collections::BTreeMap;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;
use crate::error::{Error, Result};
use super::metadata::{inherited_attribute, INHERITABLE_KEYS};

/// Merge several documents into one, keeping page order
///
/// Based on the lopdf merge example:
/// https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
///
/// Pages are taken document by document in the given order, and within a
/// document in page-tree order. Inherited page attributes are copied onto
/// the pages themselves first, because the source page trees are dropped.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    if documents.is_empty() {
        return Err(Error::General("No documents to merge".to_string()));
    }

    // Define a starting max_id for merged document
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        flatten_inherited_attributes(&mut doc);

        // Renumber objects in this document to avoid conflicts
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        page_ids.extend(doc.get_pages().into_values());

        // The source Catalog and Pages nodes are replaced by a single new tree
        objects.extend(
            doc.objects
                .into_iter()
                .filter(|(_, object)| !is_page_tree_node(object)),
        );
    }

    let mut merged_doc = Document::with_version("1.5");
    merged_doc.objects.extend(objects);

    // new_object_id() must hand out ids above everything just inserted
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = merged_doc.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    debug!(pages = page_ids.len(), "merged documents");

    Ok(merged_doc)
}

/// Serialize a document to an in-memory buffer
pub fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn is_page_tree_node(object: &Object) -> bool {
    match object.as_dict().and_then(|dict| dict.get(b"Type")) {
        Ok(Object::Name(name)) => name == b"Catalog" || name == b"Pages",
        _ => false,
    }
}

/// Copy MediaBox/CropBox/Resources/Rotate from ancestors onto each page
fn flatten_inherited_attributes(doc: &mut Document) {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in pages {
        let mut missing: Vec<(&[u8], Object)> = Vec::new();

        if let Ok(page_dict) = doc.get_object(page_id).and_then(Object::as_dict) {
            for key in INHERITABLE_KEYS {
                if page_dict.has(key) {
                    continue;
                }
                if let Some(value) = inherited_attribute(doc, page_id, key) {
                    missing.push((key, value.clone()));
                }
            }
        }

        if missing.is_empty() {
            continue;
        }

        if let Ok(Object::Dictionary(page_dict)) = doc.get_object_mut(page_id) {
            for (key, value) in missing {
                page_dict.set(key.to_vec(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use crate::layout::PageGeometry;
    use crate::pdf::metadata::page_geometries;

    fn document_with_pages(sizes: &[(i64, i64)]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for (i, &(w, h)) in sizes.iter().enumerate() {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                format!("BT /F1 12 Tf 72 72 Td (page {}) Tj ET", i + 1).into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_merge_empty_list() {
        let result = merge_documents(vec![]);
        assert!(matches!(result, Err(Error::General(_))));
    }

    #[test]
    fn test_merge_preserves_order_and_geometry() {
        let a = document_with_pages(&[(100, 200)]);
        let b = document_with_pages(&[(300, 400), (500, 600)]);

        let merged = merge_documents(vec![a, b]).unwrap();

        assert_eq!(merged.get_pages().len(), 3);
        assert_eq!(
            page_geometries(&merged).unwrap(),
            vec![
                PageGeometry::new(100.0, 200.0),
                PageGeometry::new(300.0, 400.0),
                PageGeometry::new(500.0, 600.0),
            ]
        );
    }

    #[test]
    fn test_merge_keeps_single_page_tree() {
        let merged = merge_documents(vec![
            document_with_pages(&[(100, 100)]),
            document_with_pages(&[(100, 100)]),
        ])
        .unwrap();

        let catalogs = merged
            .objects
            .values()
            .filter(|o| matches!(o.as_dict().and_then(|d| d.get(b"Type")), Ok(Object::Name(n)) if n == b"Catalog"))
            .count();
        assert_eq!(catalogs, 1);
    }

    #[test]
    fn test_flatten_inherited_media_box() {
        let mut doc = document_with_pages(&[(100, 100)]);
        // Move the MediaBox from the page up to the Pages node
        let page_id = *doc.get_pages().values().next().unwrap();
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.remove(b"MediaBox");
        }
        let pages_id = doc.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
        if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
            pages.set("MediaBox", vec![0.into(), 0.into(), 250.into(), 350.into()]);
        }

        let merged = merge_documents(vec![doc]).unwrap();
        assert_eq!(page_geometries(&merged).unwrap(), vec![PageGeometry::new(250.0, 350.0)]);
    }

    #[test]
    fn test_flatten_inherited_resources_and_rotate() {
        let mut doc = document_with_pages(&[(100, 100)]);
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let pages_id = doc.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
        if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
            pages.set("Resources", dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            });
            pages.set("Rotate", 90);
        }

        let merged = merge_documents(vec![doc]).unwrap();

        let page_id = *merged.get_pages().values().next().unwrap();
        let page = merged.get_object(page_id).unwrap().as_dict().unwrap();
        assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);

        let fonts = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|res| res.get(b"Font"))
            .and_then(Object::as_dict)
            .unwrap();
        let font_ref = fonts.get(b"F1").unwrap().as_reference().unwrap();
        let font = merged.get_object(font_ref).unwrap().as_dict().unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Courier");
    }

    #[test]
    fn test_save_to_bytes_round_trips_page_count() {
        let mut merged = merge_documents(vec![document_with_pages(&[(100, 100), (100, 100)])]).unwrap();
        let bytes = save_to_bytes(&mut merged).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 2);
    }
}
