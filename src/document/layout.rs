use crate::schema::{Recipe, RecipeIngredient, ShoppingItem};

use super::fonts::TrueTypeFont;

const CM: f32 = 72.0 / 2.54;

/// Content of an exported document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl Document {
    pub fn new(title: String, paragraphs: Vec<String>) -> Self {
        Self { title, paragraphs }
    }

    pub fn shopping_list(username: &str, site_name: &str, items: &[ShoppingItem]) -> Self {
        let paragraphs = if items.is_empty() {
            vec![String::from("The shopping cart is empty.")]
        } else {
            items
                .iter()
                .map(|item| {
                    format!(
                        "{} - {} {}",
                        item.name, item.total_amount, item.measurement_unit
                    )
                })
                .collect()
        };

        Self::new(
            format!("Shopping list for {username} ({site_name})"),
            paragraphs,
        )
    }

    pub fn recipe(
        recipe: &Recipe,
        author: &str,
        ingredients: &[RecipeIngredient],
        site_name: &str,
    ) -> Self {
        let mut paragraphs = vec![
            format!("Author: {author}"),
            format!("Description: {}", recipe.text),
            String::from("Ingredients:"),
        ];
        paragraphs.extend(ingredients.iter().map(|ingredient| {
            format!(
                "- {} ({} {})",
                ingredient.name, ingredient.amount, ingredient.measurement_unit
            )
        }));
        paragraphs.push(format!("Cooking time: {} min", recipe.cooking_time));

        Self::new(format!("Recipe: {} ({site_name})", recipe.name), paragraphs)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageStyle {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub title_size: f32,
    pub body_size: f32,
    pub footer_size: f32,
    /// Baseline distance as a multiple of the font size.
    pub leading: f32,
    pub title_space_after: f32,
    pub paragraph_space_after: f32,
}

impl Default for PageStyle {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            margin: 2.0 * CM,
            title_size: 18.0,
            body_size: 12.0,
            footer_size: 9.0,
            leading: 1.25,
            title_space_after: 1.0 * CM,
            paragraph_space_after: 0.3 * CM,
        }
    }
}

impl PageStyle {
    fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub f32, pub f32, pub f32);

pub const TITLE_COLOR: Color = Color(0.0, 0.0, 0.545);
pub const BODY_COLOR: Color = Color(0.0, 0.0, 0.0);
pub const FOOTER_COLOR: Color = Color(0.4, 0.4, 0.4);

/// A single run of text placed at a baseline position (PDF user space).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Color,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<TextLine>,
}

/// Greedy word wrap. Words wider than the line are split by character.
pub fn wrap(text: &str, font: &TrueTypeFont, size: f32, max_width: f32) -> Vec<String> {
    let fits = |candidate: &str| font.text_width(candidate, size) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        for c in word.chars() {
            current.push(c);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Places the title and paragraphs onto pages and adds the footer to each.
///
/// Always yields at least one page.
pub fn layout(
    document: &Document,
    font: &TrueTypeFont,
    style: &PageStyle,
    site_name: &str,
) -> Vec<Page> {
    let top = style.height - style.margin;
    let bottom = style.margin;
    let mut pages = vec![Page::default()];
    let mut y = top;

    for text in wrap(&document.title, font, style.title_size, style.text_width()) {
        y -= style.title_size * style.leading;
        let width = font.text_width(&text, style.title_size);
        pages[0].lines.push(TextLine {
            x: style.margin + (style.text_width() - width).max(0.0) / 2.0,
            y,
            size: style.title_size,
            color: TITLE_COLOR,
            text,
        });
    }
    y -= style.title_space_after;

    let step = style.body_size * style.leading;
    for paragraph in &document.paragraphs {
        for text in wrap(paragraph, font, style.body_size, style.text_width()) {
            if y - step < bottom {
                pages.push(Page::default());
                y = top;
            }
            y -= step;

            if let Some(page) = pages.last_mut() {
                page.lines.push(TextLine {
                    x: style.margin,
                    y,
                    size: style.body_size,
                    color: BODY_COLOR,
                    text,
                });
            }
        }
        y -= style.paragraph_space_after;
    }

    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        let text = format!("Generated by {site_name} - Page {} of {total}", index + 1);
        let width = font.text_width(&text, style.footer_size);
        page.lines.push(TextLine {
            x: style.margin + (style.text_width() - width).max(0.0) / 2.0,
            y: style.margin / 2.0,
            size: style.footer_size,
            color: FOOTER_COLOR,
            text,
        });
    }

    pages
}
