use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::models::{CachedRate, currency_symbol};

pub mod session;

pub use session::PageSession;

/// Inline style of an injected annotation.
pub const ANNOTATION_STYLE: [(&str, &str); 3] = [
    ("display", "block"),
    ("color", "#007bff"),
    ("font-size", "0.9em"),
];

/// What a single scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub annotated: usize,
    pub already_annotated: usize,
    pub unparsable: usize,
}

/// Finds price containers and appends the converted amount to each one.
#[derive(Debug, Clone)]
pub struct PriceAnnotator {
    container_class: String,
    annotation_class: String,
    page_currency: String,
}

impl PriceAnnotator {
    pub fn new(
        container_class: impl Into<String>,
        annotation_class: impl Into<String>,
        page_currency: impl Into<String>,
    ) -> Self {
        Self {
            container_class: container_class.into(),
            annotation_class: annotation_class.into(),
            page_currency: page_currency.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.container_class,
            &config.annotation_class,
            &config.page_currency,
        )
    }

    pub fn container_class(&self) -> &str {
        &self.container_class
    }

    /// Annotates every container under the document body that does not
    /// already carry an annotation. Running it again on an unchanged
    /// document adds nothing.
    pub fn scan_and_annotate(
        &self,
        doc: &mut Document,
        rate: &CachedRate,
        currency_label: &str,
    ) -> ScanReport {
        let mut report = ScanReport::default();

        if !rate.quotes(&self.page_currency) {
            tracing::warn!(
                "Rate {} does not involve {}; nothing to annotate",
                rate.display(),
                self.page_currency
            );
            return report;
        }

        let body = doc.body();
        for container in doc.query_class(body, &self.container_class) {
            if !doc.query_class(container, &self.annotation_class).is_empty() {
                report.already_annotated += 1;
                continue;
            }

            let text = doc.inner_text(container);
            let Some(amount) = parse_price(&text) else {
                tracing::debug!("Skipping unparsable price {text:?}");
                report.unparsable += 1;
                continue;
            };

            let Some(converted) = rate.convert_from(amount, &self.page_currency) else {
                continue;
            };

            let label = format_amount(round2(converted), currency_label);
            self.append_annotation(doc, container, &label);
            report.annotated += 1;
        }

        if report.annotated > 0 {
            metrics::counter!("prices_annotated_total").increment(report.annotated as u64);
        }
        tracing::debug!(
            "Scan done: {} annotated, {} already annotated, {} unparsable",
            report.annotated,
            report.already_annotated,
            report.unparsable
        );
        report
    }

    fn append_annotation(&self, doc: &mut Document, container: NodeId, label: &str) {
        let span = doc.create_element("span");
        doc.add_class(span, &self.annotation_class);
        doc.set_style(span, &ANNOTATION_STYLE);
        let text = doc.create_text(label);
        doc.append_child(span, text);
        doc.append_child(container, span);
    }
}

/// Reads an amount out of displayed price text.
///
/// Everything but digits, `,` and `-` is dropped, so Turkish thousands
/// separators (`.`) disappear and the first `,` becomes the decimal point.
/// The longest leading number is taken, the way `parseFloat` reads it.
pub fn parse_price(text: &str) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-')
        .collect();
    let normalized = kept.replacen(',', ".", 1);
    parse_float_prefix(&normalized)
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    s[..end].parse().ok()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `"$30.00 USD"`; codes without a well-known sign get no prefix.
pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{}{:.2} {}", currency_symbol(currency), amount, currency)
}
