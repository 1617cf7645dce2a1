use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::Path,
};

use lopdf::{dictionary, Object, Stream};
use ttf_parser::{Face, GlyphId};

use super::render::RenderError;

/// Font sizes are expressed per this many text space units.
const PDF_GLYPH_UNITS: f32 = 1000.0;

/// A TrueType font embedded whole into every exported PDF.
///
/// Text is shown through its glyph ids (`Identity-H`), so any script the
/// font covers survives the export.
#[derive(Clone)]
pub struct TrueTypeFont {
    name: String,
    units_per_em: f32,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    bbox: [i16; 4],
    glyphs: HashMap<char, u16>,
    advances: HashMap<u16, u16>,
    file: Stream,
}

impl fmt::Debug for TrueTypeFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrueTypeFont")
            .field("name", &self.name)
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

impl TrueTypeFont {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();

        Self::parse(&name, data).map_err(|info| RenderError::Font {
            path: path.to_path_buf(),
            info,
        })
    }

    pub fn parse(name: &str, data: Vec<u8>) -> Result<Self, String> {
        let face = Face::parse(&data, 0).map_err(|e| e.to_string())?;
        let cmap = face
            .tables()
            .cmap
            .ok_or_else(|| String::from("font has no cmap table"))?;

        let mut glyphs = HashMap::new();
        for subtable in cmap.subtables.into_iter().filter(|s| s.is_unicode()) {
            subtable.codepoints(|code_point| {
                let glyph = char::from_u32(code_point)
                    .and_then(|c| subtable.glyph_index(code_point).map(|id| (c, id.0)));
                if let Some((c, id)) = glyph {
                    glyphs.entry(c).or_insert(id);
                }
            });
        }
        if !glyphs.contains_key(&' ') {
            return Err(String::from("font has no glyph for the space character"));
        }

        let advances = glyphs
            .values()
            .chain(std::iter::once(&0))
            .map(|&id| (id, face.glyph_hor_advance(GlyphId(id)).unwrap_or(0)))
            .collect();

        let bbox = face.global_bounding_box();
        let units_per_em = f32::from(face.units_per_em());
        let ascent = face.ascender();
        let descent = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascent);
        let length = data.len() as i64;

        let mut file = Stream::new(dictionary! { "Length1" => length }, data);
        file.compress().map_err(|e| e.to_string())?;

        Ok(Self {
            name: name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect(),
            units_per_em,
            ascent,
            descent,
            cap_height,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            glyphs,
            advances,
            file,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whitespace collapses to a space; characters the font lacks map to
    /// glyph 0.
    fn glyph(&self, c: char) -> (u16, char) {
        let c = if c.is_whitespace() { ' ' } else { c };
        (self.glyphs.get(&c).copied().unwrap_or(0), c)
    }

    fn scaled(&self, units: i64) -> i64 {
        (units as f32 * PDF_GLYPH_UNITS / self.units_per_em).round() as i64
    }

    fn advance(&self, glyph: u16) -> u16 {
        self.advances.get(&glyph).copied().unwrap_or(0)
    }

    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| u32::from(self.advance(self.glyph(c).0)))
            .sum();
        units as f32 * size / self.units_per_em
    }

    /// Big-endian glyph ids for `Tj`. Every mapped glyph is recorded in
    /// `used` for the width table and the `ToUnicode` map.
    pub fn encode(&self, text: &str, used: &mut BTreeMap<u16, char>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let (glyph, shown) = self.glyph(c);
            if glyph != 0 {
                used.entry(glyph).or_insert(shown);
            }
            bytes.extend_from_slice(&glyph.to_be_bytes());
        }
        bytes
    }

    pub fn file(&self) -> &Stream {
        &self.file
    }

    pub fn descriptor(&self, file_id: lopdf::ObjectId) -> lopdf::Dictionary {
        dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(self.name.clone().into_bytes()),
            "Flags" => 32,
            "FontBBox" => self
                .bbox
                .iter()
                .map(|&v| Object::Integer(self.scaled(i64::from(v))))
                .collect::<Vec<_>>(),
            "ItalicAngle" => 0,
            "Ascent" => self.scaled(i64::from(self.ascent)),
            "Descent" => self.scaled(i64::from(self.descent)),
            "CapHeight" => self.scaled(i64::from(self.cap_height)),
            "StemV" => 80,
            "FontFile2" => file_id,
        }
    }

    /// `W` array of the descendant font: `gid [width]` per used glyph.
    pub fn widths(&self, used: &BTreeMap<u16, char>) -> Vec<Object> {
        used.keys()
            .flat_map(|&glyph| {
                let width = self.scaled(i64::from(self.advance(glyph)));
                [
                    Object::Integer(i64::from(glyph)),
                    Object::Array(vec![Object::Integer(width)]),
                ]
            })
            .collect()
    }
}

/// `ToUnicode` CMap mapping two byte glyph codes back to text.
pub fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    // A bfchar section holds at most 100 entries.
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (glyph, c) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect();
            cmap.push_str(&format!("<{glyph:04X}> <{hex}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

#[cfg(test)]
pub(crate) fn bundled_font_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("media/fonts/DejaVuSerif.ttf")
}

#[cfg(test)]
pub(crate) fn bundled_font() -> TrueTypeFont {
    TrueTypeFont::load(&bundled_font_path()).unwrap()
}
