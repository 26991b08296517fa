use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{HashMap, HashSet};

use crate::error::ContextError;

/// Page attributes that a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Base name under which the overlay is registered among the page resources.
const OVERLAY_XOBJECT_NAME: &str = "InvoiceOverlay";

/// Copies objects from one document into another, following references and
/// assigning new object IDs in the target document.
struct ObjectCopier<'a> {
    source_document: &'a Document,
    target_document: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source_document: &'a Document, target_document: &'a mut Document) -> Self {
        Self {
            source_document,
            target_document,
            id_map: HashMap::new(),
        }
    }

    /// Makes every reference to `source_id` point to `target_id` instead of copying it.
    fn redirect(&mut self, source_id: ObjectId, target_id: ObjectId) {
        self.id_map.insert(source_id, target_id);
    }

    /// Deep copies an object and everything it references, each object at most once.
    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, ContextError> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // The ID is registered before recursing so that cycles resolve to it
        let target_id = self.target_document.add_object(Object::Null);
        self.id_map.insert(source_id, target_id);

        let object = self
            .source_document
            .get_object(source_id)
            .map_err(|error| {
                ContextError::with_error(format!("Failed to find object {:?}", source_id), &error)
            })?
            .clone();
        let remapped_object = self.remap_references(object)?;
        self.target_document
            .objects
            .insert(target_id, remapped_object);

        Ok(target_id)
    }

    /// Replaces every reference found in the object by the ID of its copy.
    fn remap_references(&mut self, object: Object) -> Result<Object, ContextError> {
        match object {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(array) => Ok(Object::Array(
                array
                    .into_iter()
                    .map(|item| self.remap_references(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(dictionary) => {
                Ok(Object::Dictionary(self.remap_dictionary(dictionary)?))
            }
            Object::Stream(mut stream) => {
                stream.dict = self.remap_dictionary(stream.dict)?;
                Ok(Object::Stream(stream))
            }
            primitive => Ok(primitive),
        }
    }

    fn remap_dictionary(&mut self, mut dictionary: Dictionary) -> Result<Dictionary, ContextError> {
        for (_, value) in dictionary.iter_mut() {
            *value = self.remap_references(std::mem::replace(value, Object::Null))?;
        }
        Ok(dictionary)
    }
}

/// The first page of a document, with the attributes it inherits from the page
/// tree written into its own dictionary, together with the IDs of its ancestors.
struct FlattenedPage {
    id: ObjectId,
    dictionary: Dictionary,
    ancestors: Vec<ObjectId>,
}

fn first_page(document: &Document, role: &str) -> Result<FlattenedPage, ContextError> {
    let page_id = document
        .get_pages()
        .into_values()
        .next()
        .ok_or(ContextError::with_context(format!(
            "The {} document has no pages",
            role
        )))?;
    let mut dictionary = document
        .get_dictionary(page_id)
        .map_err(|error| {
            ContextError::with_error(format!("Failed to read the first {} page", role), &error)
        })?
        .clone();

    let mut ancestors = Vec::new();
    let mut visited = HashSet::from([page_id]);
    let mut parent = dictionary.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(parent_id) = parent.filter(|parent_id| visited.insert(*parent_id)) {
        ancestors.push(parent_id);
        let Ok(parent_dictionary) = document.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !dictionary.has(key) {
                if let Ok(value) = parent_dictionary.get(key) {
                    dictionary.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = parent_dictionary
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok();
    }
    dictionary.remove(b"Parent");

    Ok(FlattenedPage {
        id: page_id,
        dictionary,
        ancestors,
    })
}

/// Follows a reference, if the object is one.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, ContextError> {
    match object {
        Object::Reference(id) => document.get_object(*id).map_err(|error| {
            ContextError::with_error(format!("Failed to resolve the reference {:?}", id), &error)
        }),
        object => Ok(object),
    }
}

/// An owned copy of the dictionary stored under `key`, empty when absent.
fn owned_dictionary(
    document: &Document,
    dictionary: &Dictionary,
    key: &[u8],
) -> Result<Dictionary, ContextError> {
    match dictionary.get(key) {
        Ok(object) => resolve(document, object)?
            .as_dict()
            .cloned()
            .map_err(|error| {
                ContextError::with_error(
                    format!("The {} entry is not a dictionary", String::from_utf8_lossy(key)),
                    &error,
                )
            }),
        Err(_) => Ok(Dictionary::new()),
    }
}

fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>, ContextError> {
    Content { operations }
        .encode()
        .map_err(|error| ContextError::with_error("Failed to encode a content stream", &error))
}

/// Merges the first page of `overlay` on top of the first page of `template` and
/// returns a new single-page document. Both pages keep their native scale and
/// origin, the template content is left untouched underneath the overlay.
///
/// Neither input is modified, and the output only depends on the inputs.
pub fn composite(template: &Document, overlay: &Document) -> Result<Document, ContextError> {
    let template_page = first_page(template, "template")?;
    let overlay_page = first_page(overlay, "overlay")?;

    let mut output = Document::with_version(template.version.clone());
    let pages_id = output.new_object_id();
    let page_id = output.new_object_id();

    // Template page, with references back into the page tree pointing at the new tree
    let mut page = {
        let mut copier = ObjectCopier::new(template, &mut output);
        copier.redirect(template_page.id, page_id);
        for ancestor_id in template_page.ancestors.iter() {
            copier.redirect(*ancestor_id, pages_id);
        }
        copier.remap_dictionary(template_page.dictionary)?
    };

    // Overlay page, turned into a form XObject carrying its own resources
    let form_id = {
        let overlay_content = overlay.get_page_content(overlay_page.id).map_err(|error| {
            ContextError::with_error("Failed to read the content of the overlay page", &error)
        })?;
        let mut form_dictionary = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Form".to_vec())),
        ]);
        let mut copier = ObjectCopier::new(overlay, &mut output);
        copier.redirect(overlay_page.id, page_id);
        for ancestor_id in overlay_page.ancestors.iter() {
            copier.redirect(*ancestor_id, pages_id);
        }
        for (source_key, form_key) in [
            (b"MediaBox".as_slice(), "BBox"),
            (b"Resources".as_slice(), "Resources"),
        ] {
            if let Ok(value) = overlay_page.dictionary.get(source_key) {
                form_dictionary.set(form_key, copier.remap_references(value.clone())?);
            }
        }
        output.add_object(Stream::new(form_dictionary, overlay_content))
    };

    let mut resources = owned_dictionary(&output, &page, b"Resources")?;
    let mut xobjects = owned_dictionary(&output, &resources, b"XObject")?;
    let mut overlay_name = OVERLAY_XOBJECT_NAME.to_string();
    let mut suffix = 1;
    while xobjects.has(overlay_name.as_bytes()) {
        suffix += 1;
        overlay_name = format!("{OVERLAY_XOBJECT_NAME}{suffix}");
    }
    xobjects.set(overlay_name.clone(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));
    page.set("Resources", Object::Dictionary(resources));

    // The template content is isolated in its own graphics state before painting on top
    let save_state_id = output.add_object(
        Stream::new(Dictionary::new(), encode_operations(vec![Operation::new("q", vec![])])?)
            .with_compression(false),
    );
    // Streams are concatenated when read, the template one may not end with a separator
    let mut paint_overlay = b"\n".to_vec();
    paint_overlay.extend(encode_operations(vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("Do", vec![Object::Name(overlay_name.into_bytes())]),
        Operation::new("Q", vec![]),
    ])?);
    let paint_overlay_id = output
        .add_object(Stream::new(Dictionary::new(), paint_overlay).with_compression(false));
    let mut contents = vec![Object::Reference(save_state_id)];
    // Contents is either a stream or an array of streams, possibly held indirectly
    if let Ok(template_contents) = page.get(b"Contents") {
        match resolve(&output, template_contents)? {
            Object::Array(streams) => contents.extend(streams.iter().cloned()),
            _ => contents.push(template_contents.clone()),
        }
    }
    contents.push(Object::Reference(paint_overlay_id));
    page.set("Contents", Object::Array(contents));
    page.set("Parent", Object::Reference(pages_id));
    output.objects.insert(page_id, Object::Dictionary(page));

    output.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );
    let catalog_id = output.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    output.trailer.set("Root", Object::Reference(catalog_id));

    Ok(output)
}
