use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    io,
    path::{Path, PathBuf},
};

use lopdf::{
    content::{Content, Operation},
    dictionary, Object, Stream, StringFormat,
};

use crate::{
    constants::{RECIPE_PDF_DIRECTORY, SHOPPING_LIST_DIRECTORY},
    error::{Error, HttpError},
};

use super::{
    fonts::{to_unicode_cmap, TrueTypeFont},
    layout::{layout, Document, Page, PageStyle},
};

#[derive(Debug)]
pub enum RenderError {
    Font { path: PathBuf, info: String },
    Io { path: PathBuf, source: io::Error },
    Pdf(String),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Font { path, info } => {
                write!(f, "Unusable PDF font {}: {info}", path.display())
            }
            RenderError::Io { path, source } => {
                write!(f, "Cannot access {}: {source}", path.display())
            }
            RenderError::Pdf(info) => write!(f, "Cannot build PDF: {info}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<RenderError> for Error {
    fn from(value: RenderError) -> Self {
        log::error!("> {value}");
        HttpError::InternalServerError.default()
    }
}

/// Turns [`Document`]s into PDF files under the media root.
#[derive(Debug, Clone)]
pub struct Renderer {
    font: TrueTypeFont,
    style: PageStyle,
    site_name: String,
    media_root: PathBuf,
}

impl Renderer {
    /// Loads the TrueType font at `font` (relative to the media root) and
    /// prepares the output directories.
    pub fn new(font: &str, site_name: &str, media_root: &Path) -> Result<Self, RenderError> {
        let font = TrueTypeFont::load(&media_root.join(font))?;
        log::info!("> PDF font {} loaded", font.name());

        for directory in [SHOPPING_LIST_DIRECTORY, RECIPE_PDF_DIRECTORY] {
            let path = media_root.join(directory);
            std::fs::create_dir_all(&path).map_err(|source| RenderError::Io { path, source })?;
        }

        Ok(Self {
            font,
            style: PageStyle::default(),
            site_name: site_name.to_string(),
            media_root: media_root.to_path_buf(),
        })
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn render(&self, document: &Document) -> Result<Vec<u8>, RenderError> {
        let pages = layout(document, &self.font, &self.style, &self.site_name);
        self.write_pdf(&document.title, &pages)
    }

    /// Renders and stores the document at `relative` under the media root.
    pub async fn export(&self, document: &Document, relative: &str) -> Result<Vec<u8>, RenderError> {
        let bytes = self.render(document)?;
        let path = self.media_root.join(relative);

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| RenderError::Io { path, source })?;

        log::debug!("> Exported {relative} ({} bytes)", bytes.len());
        Ok(bytes)
    }

    fn write_pdf(&self, title: &str, pages: &[Page]) -> Result<Vec<u8>, RenderError> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut used = BTreeMap::new();

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page in pages {
            let content = Content {
                operations: self.page_operations(page, &mut used),
            };
            let encoded = content.encode().map_err(|e| RenderError::Pdf(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let font_id = self.add_font(&mut doc, &used);
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(self.style.width),
                    Object::Real(self.style.height),
                ],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => text_string(title),
            "Producer" => text_string(&self.site_name),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;

        Ok(buffer)
    }

    /// Type0 font over an Identity-H CIDFontType2 descendant.
    fn add_font(&self, doc: &mut lopdf::Document, used: &BTreeMap<u16, char>) -> lopdf::ObjectId {
        let name = self.font.name();
        let file_id = doc.add_object(self.font.file().clone());
        let descriptor_id = doc.add_object(self.font.descriptor(file_id));

        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => Object::Name(name.as_bytes().to_vec()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "CIDToGIDMap" => "Identity",
            "W" => self.font.widths(used),
        });
        let to_unicode_id = doc.add_object(Stream::new(
            dictionary! {},
            to_unicode_cmap(used).into_bytes(),
        ));

        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(name.as_bytes().to_vec()),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
            "ToUnicode" => to_unicode_id,
        })
    }

    fn page_operations(&self, page: &Page, used: &mut BTreeMap<u16, char>) -> Vec<Operation> {
        let mut operations = Vec::with_capacity(page.lines.len() * 6);

        for line in &page.lines {
            let glyphs = self.font.encode(&line.text, used);

            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), line.size.into()]));
            operations.push(Operation::new(
                "rg",
                vec![line.color.0.into(), line.color.1.into(), line.color.2.into()],
            ));
            operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(glyphs, StringFormat::Hexadecimal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        operations
    }
}

/// PDF text string in UTF-16BE with a byte order mark.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use lopdf::{content::Content, Object};

    use super::*;
    use crate::document::fonts::bundled_font_path;

    pub const FONT: &str = "fonts/DejaVuSerif.ttf";

    /// Fresh media root holding the bundled font.
    pub fn media_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("foodgram-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("fonts")).unwrap();
        std::fs::copy(bundled_font_path(), root.join(FONT)).unwrap();
        root
    }

    fn unicode_map(cmap: &[u8]) -> HashMap<u16, String> {
        let cmap = String::from_utf8_lossy(cmap);
        let mut map = HashMap::new();
        let mut in_section = false;

        for line in cmap.lines() {
            if line.ends_with("beginbfchar") {
                in_section = true;
            } else if line == "endbfchar" {
                in_section = false;
            } else if in_section {
                let codes: Vec<&str> = line
                    .split(|c: char| c == '<' || c == '>' || c == ' ')
                    .filter(|part| !part.is_empty())
                    .collect();
                let glyph = u16::from_str_radix(codes[0], 16).unwrap();
                let units: Vec<u16> = (0..codes[1].len())
                    .step_by(4)
                    .map(|i| u16::from_str_radix(&codes[1][i..i + 4], 16).unwrap())
                    .collect();
                map.insert(glyph, String::from_utf16(&units).unwrap());
            }
        }
        map
    }

    /// Text of each line shown on `page`, mapped back through the
    /// font's `ToUnicode` CMap.
    pub fn page_text(bytes: &[u8], page: u32) -> Vec<String> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        let fonts = doc.get_page_fonts(page_id);
        let font = fonts[b"F1".as_slice()];

        let cmap_id = font.get(b"ToUnicode").unwrap().as_reference().unwrap();
        let cmap = doc.get_object(cmap_id).unwrap().as_stream().unwrap();
        let map = unicode_map(
            &cmap
                .decompressed_content()
                .unwrap_or_else(|_| cmap.content.clone()),
        );

        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|operation| operation.operator == "Tj")
            .map(|operation| match &operation.operands[0] {
                Object::String(glyphs, _) => glyphs
                    .chunks(2)
                    .map(|pair| {
                        let glyph = u16::from_be_bytes([pair[0], pair[1]]);
                        map.get(&glyph).cloned().unwrap_or_else(|| String::from("\u{FFFD}"))
                    })
                    .collect(),
                other => panic!("unexpected Tj operand {other:?}"),
            })
            .collect()
    }
}
