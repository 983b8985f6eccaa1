//! Per-dog PDF report.
//!
//! DESIGN
//! ======
//! Report building is split in three steps:
//! 1. [`load`] reads the dog, its events, programs and bookings.
//! 2. [`layout`] turns that data into positioned [`TextLine`]s, paginating
//!    as it goes. This is pure and is what the tests exercise.
//! 3. [`render`] paints the lines onto A4 pages.
//!
//! FONTS
//! =====
//! Club data is mostly Cyrillic, so [`render`] embeds a TrueType font found
//! by [`ReportFonts::discover`] at startup. Without one it falls back to the
//! built-in Helvetica faces, which only cover Latin-1; other characters are
//! then replaced with `?` by [`pdf_safe`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use sqlx::{PgPool, Row};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::db::catalog::{CatalogError, QueryCatalog};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_LEFT_MM: f32 = 20.0;
const VALUE_COLUMN_MM: f32 = 68.0;
const TOP_MM: f32 = 277.0;
const BOTTOM_MM: f32 = 22.0;
const FOOTER_MM: f32 = 12.0;
const TITLE_PT: f32 = 18.0;
const SECTION_PT: f32 = 13.0;
const BODY_PT: f32 = 10.0;
const FOOTER_PT: f32 = 8.0;
const BODY_LINE_MM: f32 = 6.0;
const WRAP_CHARS: usize = 92;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("dog not found")]
    NotFound,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("pdf rendering failed: {0}")]
    Render(String),
}

// =============================================================================
// FONTS
// =============================================================================

/// Regular and bold file names of Cyrillic-capable families, best first.
const FONT_FAMILIES: [(&str, &str); 6] = [
    ("DejaVuSans.ttf", "DejaVuSans-Bold.ttf"),
    ("LiberationSans-Regular.ttf", "LiberationSans-Bold.ttf"),
    ("OpenSans-Regular.ttf", "OpenSans-Bold.ttf"),
    ("arial.ttf", "arialbd.ttf"),
    ("Arial.ttf", "Arial Bold.ttf"),
    ("tahoma.ttf", "tahomabd.ttf"),
];

const FONT_SEARCH_DEPTH: usize = 4;

/// TrueType faces embedded into reports. Empty means built-in Helvetica.
#[derive(Debug, Clone, Default)]
pub struct ReportFonts {
    regular: Option<Arc<Vec<u8>>>,
    bold: Option<Arc<Vec<u8>>>,
}

impl ReportFonts {
    #[must_use]
    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Self {
        Self { regular: Some(Arc::new(regular)), bold: bold.map(Arc::new) }
    }

    /// Whether a TrueType face is loaded.
    #[must_use]
    pub fn is_unicode(&self) -> bool {
        self.regular.is_some()
    }

    /// Look under `dir` (recursively) for the first known family and read it.
    /// A family without a bold file uses the regular face for both.
    #[must_use]
    pub fn discover(dir: &Path) -> Self {
        let files = font_files(dir);
        for (regular, bold) in FONT_FAMILIES {
            let Some(regular_path) = files.iter().find(|p| p.file_name().is_some_and(|n| n == regular)) else {
                continue;
            };
            let regular_bytes = match std::fs::read(regular_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, path = %regular_path.display(), "unreadable report font");
                    continue;
                }
            };
            let bold_bytes = files
                .iter()
                .find(|p| p.file_name().is_some_and(|n| n == bold))
                .and_then(|p| std::fs::read(p).ok());
            tracing::info!(path = %regular_path.display(), "report font loaded");
            return Self::from_bytes(regular_bytes, bold_bytes);
        }
        Self::default()
    }
}

/// Every regular file under `dir`, up to [`FONT_SEARCH_DEPTH`] levels deep.
fn font_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), 0)];
    while let Some((current, depth)) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if depth < FONT_SEARCH_DEPTH {
                    pending.push((path, depth + 1));
                }
            } else {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

// =============================================================================
// DATA
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DogFacts {
    pub name: String,
    pub breed: String,
    pub sex: String,
    pub birth_date: Option<Date>,
    pub chip_number: Option<String>,
    pub owner_name: String,
    pub owner_phone: Option<String>,
    pub owner_email: Option<String>,
    pub owner_city: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry {
    pub title: String,
    pub category: String,
    pub start_at: OffsetDateTime,
    pub venue: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramEntry {
    pub title: String,
    pub kind: String,
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
    pub service_name: String,
    pub status: String,
    pub requested_at: OffsetDateTime,
    pub performed_at: Option<OffsetDateTime>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DogReportData {
    pub dog: DogFacts,
    pub events: Vec<EventEntry>,
    pub programs: Vec<ProgramEntry>,
    pub services: Vec<ServiceEntry>,
    pub generated_at: OffsetDateTime,
}

/// Read everything the report shows.
///
/// # Errors
///
/// Returns [`ReportError::NotFound`] for an unknown dog.
pub async fn load(pool: &PgPool, queries: &QueryCatalog, dog_id: i64) -> Result<DogReportData, ReportError> {
    let row = sqlx::query(queries.get("dog")?)
        .bind(dog_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ReportError::NotFound)?;
    let dog = DogFacts {
        name: row.get("dog_name"),
        breed: row.get("breed"),
        sex: row.get("sex"),
        birth_date: row.get("birth_date"),
        chip_number: row.get("chip_number"),
        owner_name: row.get("owner_name"),
        owner_phone: row.get("owner_phone"),
        owner_email: row.get("owner_email"),
        owner_city: row.get("owner_city"),
    };

    let events = sqlx::query(queries.get("dog_events")?)
        .bind(dog_id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| EventEntry {
            title: r.get("title"),
            category: r.get("category"),
            start_at: r.get("start_at"),
            venue: r.get("venue"),
        })
        .collect();

    let programs = sqlx::query(queries.get("dog_programs")?)
        .bind(dog_id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| ProgramEntry { title: r.get("title"), kind: r.get("type"), registered_at: r.get("registered_at") })
        .collect();

    let services = sqlx::query(queries.get("dog_service_history")?)
        .bind(dog_id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| ServiceEntry {
            service_name: r.get("service_name"),
            status: r.get("status"),
            requested_at: r.get("requested_at"),
            performed_at: r.get("performed_at"),
            price: r.get("price"),
        })
        .collect();

    Ok(DogReportData { dog, events, programs, services, generated_at: OffsetDateTime::now_utc() })
}

// =============================================================================
// FORMATTING
// =============================================================================

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]")).unwrap_or_default()
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]")).unwrap_or_default()
}

fn plural(n: i32, unit: &str) -> String {
    if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") }
}

/// Age between `birth` and `today` in whole years and months.
#[must_use]
pub fn age_text(birth: Date, today: Date) -> Option<String> {
    let month_delta = i32::from(u8::from(today.month())) - i32::from(u8::from(birth.month()));
    let mut months = (today.year() - birth.year()) * 12 + month_delta;
    if today.day() < birth.day() {
        months -= 1;
    }
    if months < 0 {
        return None;
    }
    let (years, rest) = (months / 12, months % 12);
    Some(match (years, rest) {
        (0, 0) => "less than a month".to_owned(),
        (0, m) => plural(m, "month"),
        (y, 0) => plural(y, "year"),
        (y, m) => format!("{} {}", plural(y, "year"), plural(m, "month")),
    })
}

/// Tabs become spaces, other control characters `?`.
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\t' { ' ' } else if c.is_control() { '?' } else { c })
        .collect()
}

/// Replace characters the built-in fonts cannot draw.
#[must_use]
pub fn pdf_safe(text: &str) -> String {
    clean_text(text)
        .chars()
        .map(|c| if (c as u32) > 0xFF { '?' } else { c })
        .collect()
}

/// Greedy word wrap at `width` characters. Overlong words are split.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        if current.is_empty() {
            current = word;
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// =============================================================================
// LAYOUT
// =============================================================================

/// One line of text at an absolute page position (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub page: usize,
    pub x_mm: f32,
    pub y_mm: f32,
    pub size_pt: f32,
    pub bold: bool,
    pub text: String,
}

struct Cursor {
    page: usize,
    y: f32,
    lines: Vec<TextLine>,
}

impl Cursor {
    fn reserve(&mut self, height: f32) {
        if self.y - height < BOTTOM_MM {
            self.page += 1;
            self.y = TOP_MM;
        }
    }

    fn put(&mut self, x_mm: f32, size_pt: f32, bold: bool, text: &str) {
        self.lines.push(TextLine { page: self.page, x_mm, y_mm: self.y, size_pt, bold, text: clean_text(text) });
    }

    fn heading(&mut self, text: &str) {
        self.reserve(BODY_LINE_MM * 3.0);
        self.y -= 4.0;
        self.put(MARGIN_LEFT_MM, SECTION_PT, true, text);
        self.y -= BODY_LINE_MM + 1.0;
    }

    fn row(&mut self, label: &str, value: &str) {
        let wrapped = wrap(value, WRAP_CHARS - 30);
        self.reserve(BODY_LINE_MM * wrapped.len() as f32);
        self.put(MARGIN_LEFT_MM, BODY_PT, true, label);
        for part in wrapped {
            self.put(VALUE_COLUMN_MM, BODY_PT, false, &part);
            self.y -= BODY_LINE_MM;
        }
    }

    fn paragraph(&mut self, text: &str) {
        for part in wrap(text, WRAP_CHARS) {
            self.reserve(BODY_LINE_MM);
            self.put(MARGIN_LEFT_MM, BODY_PT, false, &part);
            self.y -= BODY_LINE_MM;
        }
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

/// Position every line of the report. Pages are numbered from 0.
#[must_use]
pub fn layout(data: &DogReportData) -> Vec<TextLine> {
    let dog = &data.dog;
    let mut cursor = Cursor { page: 0, y: TOP_MM, lines: Vec::new() };

    cursor.put(MARGIN_LEFT_MM, TITLE_PT, true, &format!("Dog report: {}", dog.name));
    cursor.y -= 12.0;

    cursor.heading("Dog");
    let sex = match dog.sex.as_str() {
        "M" => "Male",
        "F" => "Female",
        other => other,
    };
    let birth = dog.birth_date.map_or_else(
        || "unknown".to_owned(),
        |birth| match age_text(birth, data.generated_at.date()) {
            Some(age) => format!("{} ({age})", format_date(birth)),
            None => format_date(birth),
        },
    );
    cursor.row("Name", &dog.name);
    cursor.row("Breed", &dog.breed);
    cursor.row("Sex", sex);
    cursor.row("Birth date", &birth);
    cursor.row("Chip number", dog.chip_number.as_deref().unwrap_or("not chipped"));
    cursor.row("Owner", &dog.owner_name);
    cursor.row("Phone", or_dash(dog.owner_phone.as_deref()));
    cursor.row("Email", or_dash(dog.owner_email.as_deref()));
    cursor.row("City", or_dash(dog.owner_city.as_deref()));

    cursor.heading("Events");
    if data.events.is_empty() {
        cursor.paragraph("No registered events.");
    }
    for event in &data.events {
        cursor.paragraph(&format!(
            "{}  {} ({}), {}",
            format_timestamp(event.start_at),
            event.title,
            event.category,
            event.venue
        ));
    }

    cursor.heading("Training programs");
    if data.programs.is_empty() {
        cursor.paragraph("Not enrolled in any program.");
    }
    for program in &data.programs {
        cursor.paragraph(&format!(
            "{} ({}), enrolled {}",
            program.title,
            program.kind,
            format_timestamp(program.registered_at)
        ));
    }

    cursor.heading("Service history");
    if data.services.is_empty() {
        cursor.paragraph("No services booked.");
    }
    for service in &data.services {
        let mut line = format!(
            "{}  {}  {}",
            format_timestamp(service.requested_at),
            service.service_name,
            service.status
        );
        if let Some(done) = service.performed_at {
            line.push_str(&format!(", performed {}", format_timestamp(done)));
        }
        if let Some(price) = service.price {
            line.push_str(&format!(", {price:.2}"));
        }
        cursor.paragraph(&line);
    }

    let pages = cursor.page + 1;
    let generated = format_timestamp(data.generated_at);
    for page in 0..pages {
        cursor.lines.push(TextLine {
            page,
            x_mm: MARGIN_LEFT_MM,
            y_mm: FOOTER_MM,
            size_pt: FOOTER_PT,
            bold: false,
            text: format!("Generated {generated} UTC - page {} of {pages}", page + 1),
        });
    }
    cursor.lines
}

// =============================================================================
// RENDER
// =============================================================================

struct Faces {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    unicode: bool,
}

fn builtin_faces(doc: &PdfDocumentReference) -> Result<Faces, ReportError> {
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    Ok(Faces { regular, bold, unicode: false })
}

fn external_faces(doc: &PdfDocumentReference, fonts: &ReportFonts) -> Option<Faces> {
    let regular_bytes = fonts.regular.as_deref()?;
    let regular = match doc.add_external_font(regular_bytes.as_slice()) {
        Ok(font) => font,
        Err(e) => {
            tracing::warn!(error = %e, "report font rejected, using Helvetica");
            return None;
        }
    };
    let bold = match fonts.bold.as_deref().map(|b| doc.add_external_font(b.as_slice())) {
        Some(Ok(font)) => font,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "bold report font rejected, using the regular face");
            regular.clone()
        }
        None => regular.clone(),
    };
    Some(Faces { regular, bold, unicode: true })
}

/// Paint positioned lines into a PDF document, embedding `fonts` when
/// available and falling back to Helvetica otherwise.
///
/// # Errors
///
/// Returns [`ReportError::Render`] if the PDF backend fails.
pub fn render(title: &str, lines: &[TextLine], fonts: &ReportFonts) -> Result<Vec<u8>, ReportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(pdf_safe(title), Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let faces = match external_faces(&doc, fonts) {
        Some(faces) => faces,
        None => builtin_faces(&doc)?,
    };

    let page_count = lines.iter().map(|l| l.page + 1).max().unwrap_or(1);
    let mut layers = vec![doc.get_page(first_page).get_layer(first_layer)];
    for _ in 1..page_count {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        layers.push(doc.get_page(page).get_layer(layer));
    }

    for line in lines {
        let font = if line.bold { &faces.bold } else { &faces.regular };
        let text = if faces.unicode { line.text.clone() } else { pdf_safe(&line.text) };
        if let Some(layer) = layers.get(line.page) {
            layer.use_text(text, line.size_pt, Mm(line.x_mm), Mm(line.y_mm), font);
        }
    }

    doc.save_to_bytes().map_err(|e| ReportError::Render(e.to_string()))
}

/// Load, lay out and render the report for one dog.
///
/// # Errors
///
/// See [`load`] and [`render`].
pub async fn build(
    pool: &PgPool,
    queries: &QueryCatalog,
    fonts: Arc<ReportFonts>,
    dog_id: i64,
) -> Result<Vec<u8>, ReportError> {
    let data = load(pool, queries, dog_id).await?;
    let title = format!("Dog report: {}", data.dog.name);
    let lines = layout(&data);
    tokio::task::spawn_blocking(move || render(&title, &lines, &fonts))
        .await
        .map_err(|e| ReportError::Render(e.to_string()))?
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
