//! OPEX XML rendering of manifest descriptors.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::descriptor::{DescriptiveElement, ManifestDescriptor};
use crate::error::ManifestError;

/// OPEX v1.2 namespace.
pub const OPEX_NAMESPACE: &str = "http://www.openpreservationexchange.org/opex/v1.2";

/// Turns a descriptor into sidecar bytes.
pub trait DescriptorWriter {
    /// Render a descriptor. Equal descriptors must render to equal bytes.
    fn render(&self, descriptor: &ManifestDescriptor) -> Result<Vec<u8>, ManifestError>;
}

/// Renders `opex:OPEXMetadata` documents.
#[derive(Debug, Clone, Copy)]
pub struct XmlDescriptorWriter {
    indent: usize,
}

impl Default for XmlDescriptorWriter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl XmlDescriptorWriter {
    /// Create a writer with the given indentation width.
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }
}

struct Out {
    writer: Writer<Vec<u8>>,
}

impl Out {
    fn event(&mut self, event: Event<'_>) -> Result<(), ManifestError> {
        self.writer
            .write_event(event)
            .map_err(|e| ManifestError::Render(e.to_string()))
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut start = BytesStart::new(name.to_string());
        for attr in attrs {
            start.push_attribute(*attr);
        }
        start
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ManifestError> {
        self.event(Event::Start(Self::element(name, attrs)))
    }

    fn end(&mut self, name: &str) -> Result<(), ManifestError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ManifestError> {
        self.event(Event::Empty(Self::element(name, attrs)))
    }

    fn text(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), ManifestError> {
        self.start(name, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Write a list wrapper, self-closing when empty.
    fn list<T>(
        &mut self,
        name: &str,
        items: &[T],
        mut write: impl FnMut(&mut Self, &T) -> Result<(), ManifestError>,
    ) -> Result<(), ManifestError> {
        if items.is_empty() {
            return self.empty(name, &[]);
        }
        self.start(name, &[])?;
        for item in items {
            write(self, item)?;
        }
        self.end(name)
    }

    /// Descriptive elements are nested iteratively; the stack holds
    /// `(element, closing)` pairs.
    fn descriptive(
        &mut self,
        prefix: &str,
        root: &DescriptiveElement,
        namespace: &str,
    ) -> Result<(), ManifestError> {
        let xmlns = format!("xmlns:{prefix}");
        let root_attrs = [(xmlns.as_str(), namespace)];
        let mut stack: Vec<(&DescriptiveElement, bool)> = vec![(root, false)];
        let mut first = true;

        while let Some((element, closing)) = stack.pop() {
            let name = format!("{prefix}:{}", element.name);
            let attrs: &[(&str, &str)] = if first { &root_attrs } else { &[] };
            first = false;

            if closing {
                self.end(&name)?;
                continue;
            }
            match (&element.value, element.children.is_empty()) {
                (Some(value), true) => self.text(&name, attrs, value)?,
                (None, true) => self.empty(&name, attrs)?,
                (value, false) => {
                    self.start(&name, attrs)?;
                    if let Some(value) = value {
                        self.event(Event::Text(BytesText::new(value)))?;
                    }
                    stack.push((element, true));
                    stack.extend(element.children.iter().rev().map(|c| (c, false)));
                }
            }
        }
        Ok(())
    }
}

impl DescriptorWriter for XmlDescriptorWriter {
    fn render(&self, descriptor: &ManifestDescriptor) -> Result<Vec<u8>, ManifestError> {
        let mut out = Out {
            writer: Writer::new_with_indent(Vec::new(), b' ', self.indent),
        };

        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        out.start("opex:OPEXMetadata", &[("xmlns:opex", OPEX_NAMESPACE)])?;

        let has_transfer = descriptor.source_id.is_some()
            || descriptor.manifest.is_some()
            || !descriptor.fixities.is_empty();
        if has_transfer {
            out.start("opex:Transfer", &[])?;
            if let Some(source_id) = &descriptor.source_id {
                out.text("opex:SourceID", &[], source_id)?;
            }
            if let Some(manifest) = &descriptor.manifest {
                out.start("opex:Manifest", &[])?;
                out.list("opex:Folders", &manifest.folders, |out, folder| {
                    out.text("opex:Folder", &[], folder)
                })?;
                out.list("opex:Files", &manifest.files, |out, file| {
                    let size = file.size.map(|s| s.to_string());
                    let mut attrs = vec![("type", file.kind.as_str())];
                    if let Some(size) = &size {
                        attrs.push(("size", size.as_str()));
                    }
                    out.text("opex:File", &attrs, &file.name)
                })?;
                out.end("opex:Manifest")?;
            }
            if !descriptor.fixities.is_empty() {
                out.list("opex:Fixities", &descriptor.fixities, |out, fixity| {
                    out.empty(
                        "opex:Fixity",
                        &[("type", fixity.algorithm.as_str()), ("value", fixity.value.as_str())],
                    )
                })?;
            }
            out.end("opex:Transfer")?;
        }

        if let Some(properties) = &descriptor.properties {
            out.start("opex:Properties", &[])?;
            if let Some(title) = &properties.title {
                out.text("opex:Title", &[], title)?;
            }
            if let Some(description) = &properties.description {
                out.text("opex:Description", &[], description)?;
            }
            if let Some(security) = &properties.security {
                out.text("opex:SecurityDescriptor", &[], security)?;
            }
            if !properties.identifiers.is_empty() {
                out.list("opex:Identifiers", &properties.identifiers, |out, id| {
                    out.text("opex:Identifier", &[("type", id.kind.as_str())], &id.value)
                })?;
            }
            out.end("opex:Properties")?;
        }

        if !descriptor.descriptive.is_empty() {
            out.start("opex:DescriptiveMetadata", &[])?;
            for block in &descriptor.descriptive {
                out.descriptive(&block.prefix, &block.root, &block.namespace)?;
            }
            out.end("opex:DescriptiveMetadata")?;
        }

        out.end("opex:OPEXMetadata")?;

        let mut bytes = out.writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptiveBlock, FileEntry, Identifier, Manifest, Properties};
    use crate::fixity::Fixity;

    fn render(descriptor: &ManifestDescriptor) -> String {
        String::from_utf8(XmlDescriptorWriter::default().render(descriptor).unwrap()).unwrap()
    }

    fn directory() -> ManifestDescriptor {
        ManifestDescriptor {
            manifest: Some(Manifest {
                folders: vec!["Sub".to_string()],
                files: vec![
                    FileEntry::content("a&b.txt", 3),
                    FileEntry::metadata("a&b.txt.opex"),
                ],
            }),
            properties: Some(Properties {
                title: Some("Root".to_string()),
                security: Some("open".to_string()),
                identifiers: vec![Identifier::new("code", "COLL/1")],
                ..Properties::default()
            }),
            ..ManifestDescriptor::default()
        }
    }

    #[test]
    fn test_directory_document() {
        let xml = render(&directory());
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(xml.contains(&format!("<opex:OPEXMetadata xmlns:opex=\"{OPEX_NAMESPACE}\">")));
        assert!(xml.contains("<opex:Folder>Sub</opex:Folder>"));
        assert!(xml.contains("<opex:File type=\"content\" size=\"3\">a&amp;b.txt</opex:File>"));
        assert!(xml.contains("<opex:File type=\"metadata\">a&amp;b.txt.opex</opex:File>"));
        assert!(xml.contains("<opex:Identifier type=\"code\">COLL/1</opex:Identifier>"));
        assert!(xml.contains("<opex:SecurityDescriptor>open</opex:SecurityDescriptor>"));
        assert!(!xml.contains("opex:Description"));
        assert!(xml.find("opex:Transfer").unwrap() < xml.find("opex:Properties").unwrap());
    }

    #[test]
    fn test_empty_lists_self_close() {
        let xml = render(&ManifestDescriptor {
            manifest: Some(Manifest::default()),
            ..ManifestDescriptor::default()
        });
        assert!(xml.contains("<opex:Folders/>"));
        assert!(xml.contains("<opex:Files/>"));
    }

    #[test]
    fn test_file_document_with_fixity() {
        let xml = render(&ManifestDescriptor {
            source_id: Some("SRC-9".to_string()),
            fixities: vec![Fixity::new("SHA-1", "ABC", "/a")],
            ..ManifestDescriptor::default()
        });
        assert!(xml.contains("<opex:SourceID>SRC-9</opex:SourceID>"));
        assert!(xml.contains("<opex:Fixity type=\"SHA-1\" value=\"ABC\"/>"));
        assert!(!xml.contains("opex:Manifest"));
        assert!(!xml.contains("opex:Properties"));
    }

    #[test]
    fn test_descriptive_block() {
        let root = DescriptiveElement {
            name: "dc".to_string(),
            value: None,
            children: vec![DescriptiveElement {
                name: "creator".to_string(),
                value: Some("Someone".to_string()),
                children: Vec::new(),
            }],
        };
        let xml = render(&ManifestDescriptor {
            descriptive: vec![DescriptiveBlock {
                prefix: "dc".to_string(),
                namespace: "http://purl.org/dc/elements/1.1/".to_string(),
                root,
            }],
            ..ManifestDescriptor::default()
        });
        assert!(xml.contains("<dc:dc xmlns:dc=\"http://purl.org/dc/elements/1.1/\">"));
        assert!(xml.contains("<dc:creator>Someone</dc:creator>"));
        assert!(xml.contains("</dc:dc>"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let descriptor = directory();
        let writer = XmlDescriptorWriter::default();
        assert_eq!(writer.render(&descriptor).unwrap(), writer.render(&descriptor).unwrap());
    }
}
