//! Built-in analysis engine backed by tree-sitter-css

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use async_trait::async_trait;
use regex::Regex;
use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, CompletionItem, CompletionItemKind,
    CompletionList, Diagnostic, DiagnosticSeverity, DocumentLink, Documentation, FoldingRange,
    FoldingRangeKind, Hover, HoverContents, Location, MarkupContent, MarkupKind, NumberOrString,
    Position, Range, SelectionRange, SymbolInformation, SymbolKind, TextEdit, Url,
};
use tracing::{debug, warn};
use tree_sitter::{Node, Tree};

use crate::document::TextDocument;
use crate::service::context::DocumentContext;
use crate::service::error::ServiceError;
use crate::service::fs::{FileSystemProvider, FileType};
use crate::service::registry::LanguageServices;
use crate::service::traits::LanguageService;
use crate::service::types::{CustomData, DataEntry, LanguageSettings, LintLevel};

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3,4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .expect("Failed to compile hex color pattern")
});

const EMPTY_RULES: &str = "emptyRules";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Css,
    Scss,
    Less,
}

impl Dialect {
    pub fn language_id(self) -> &'static str {
        match self {
            Dialect::Css => "css",
            Dialect::Scss => "scss",
            Dialect::Less => "less",
        }
    }
}

/// Parsed stylesheet
pub struct Stylesheet {
    tree: Tree,
}

impl Stylesheet {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

pub struct StylesheetService {
    dialect: Dialect,
    fs: Arc<dyn FileSystemProvider>,
    settings: RwLock<Option<LanguageSettings>>,
    custom_data: RwLock<CustomData>,
}

impl StylesheetService {
    pub fn new(dialect: Dialect, fs: Arc<dyn FileSystemProvider>) -> Self {
        Self {
            dialect,
            fs,
            settings: RwLock::new(None),
            custom_data: RwLock::new(CustomData::default()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn effective_settings(&self, settings: Option<&LanguageSettings>) -> LanguageSettings {
        match settings {
            Some(settings) => settings.clone(),
            None => self
                .settings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_default(),
        }
    }

    fn diagnostic(
        &self,
        range: Range,
        severity: DiagnosticSeverity,
        code: Option<&str>,
        message: String,
    ) -> Diagnostic {
        Diagnostic {
            range,
            severity: Some(severity),
            code: code.map(|c| NumberOrString::String(c.to_string())),
            source: Some(self.dialect.language_id().to_string()),
            message,
            ..Default::default()
        }
    }

    fn syntax_errors(&self, document: &TextDocument, stylesheet: &Stylesheet) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        visit(stylesheet.root(), |node| {
            if node.is_error() {
                diagnostics.push(self.diagnostic(
                    node_range(document, node),
                    DiagnosticSeverity::ERROR,
                    None,
                    "Unexpected input".to_string(),
                ));
                return false;
            }
            if node.is_missing() {
                diagnostics.push(self.diagnostic(
                    node_range(document, node),
                    DiagnosticSeverity::ERROR,
                    None,
                    format!("{} expected", node.kind()),
                ));
            }
            true
        });
        diagnostics
    }

    fn empty_rules(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
        level: LintLevel,
    ) -> Vec<Diagnostic> {
        let severity = match level {
            LintLevel::Ignore => return Vec::new(),
            LintLevel::Warning => DiagnosticSeverity::WARNING,
            LintLevel::Error => DiagnosticSeverity::ERROR,
        };

        let mut diagnostics = Vec::new();
        visit(stylesheet.root(), |node| {
            if node.kind() == "rule_set"
                && let Some(selectors) = child_of_kind(node, "selectors")
                && let Some(block) = child_of_kind(node, "block")
                && is_empty_block(block)
            {
                diagnostics.push(self.diagnostic(
                    node_range(document, selectors),
                    severity,
                    Some(EMPTY_RULES),
                    "Do not use empty rulesets".to_string(),
                ));
            }
            true
        });
        diagnostics
    }

    /// SCSS resolves `@import 'name'` to `name.scss`, `_name.scss` or
    /// `name/_index.scss`, whichever exists first.
    async fn resolve_partial(&self, target: &Url) -> Option<Url> {
        let name = target.path_segments()?.next_back()?.to_string();
        if name.is_empty() || name.contains('.') {
            return None;
        }

        let candidates = [
            format!("{}.scss", name),
            format!("_{}.scss", name),
            format!("{}/_index.scss", name),
        ];
        for candidate in candidates {
            let Ok(uri) = target.join(&candidate) else {
                continue;
            };
            match self.fs.stat(&uri).await {
                Ok(stat) if stat.file_type == FileType::File => return Some(uri),
                Ok(_) => {}
                Err(e) => debug!("Failed to stat {}: {}", uri, e),
            }
        }
        None
    }
}

/// Registry with one engine per supported dialect, `css` being the default.
pub fn language_services(fs: Arc<dyn FileSystemProvider>) -> LanguageServices<StylesheetService> {
    LanguageServices::new(StylesheetService::new(Dialect::Css, Arc::clone(&fs)))
        .with(
            Dialect::Scss.language_id(),
            StylesheetService::new(Dialect::Scss, Arc::clone(&fs)),
        )
        .with(
            Dialect::Less.language_id(),
            StylesheetService::new(Dialect::Less, fs),
        )
}

#[async_trait]
impl LanguageService for StylesheetService {
    type Stylesheet = Stylesheet;

    fn parse_stylesheet(&self, document: &TextDocument) -> Result<Stylesheet, ServiceError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_css::LANGUAGE;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set CSS language for tree-sitter: {}", e);
            ServiceError::Parse(e.to_string())
        })?;

        let tree = parser.parse(document.text(), None).ok_or_else(|| {
            warn!("Failed to parse {}", document.uri());
            ServiceError::Parse(document.uri().to_string())
        })?;

        Ok(Stylesheet { tree })
    }

    fn do_validation(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
        settings: Option<&LanguageSettings>,
    ) -> Result<Vec<Diagnostic>, ServiceError> {
        let settings = self.effective_settings(settings);
        if !settings.validate {
            return Ok(Vec::new());
        }

        // The grammar only knows plain CSS; SCSS and Less syntax would be noise.
        let mut diagnostics = if self.dialect == Dialect::Css {
            self.syntax_errors(document, stylesheet)
        } else {
            Vec::new()
        };
        diagnostics.extend(self.empty_rules(
            document,
            stylesheet,
            settings.lint_level(EMPTY_RULES, LintLevel::Warning),
        ));

        Ok(diagnostics)
    }

    fn configure(&self, settings: Option<LanguageSettings>) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    fn add_custom_data(&self, data: &CustomData) {
        let mut custom_data = self
            .custom_data
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        custom_data.properties.extend(data.properties.iter().cloned());
        custom_data
            .at_directives
            .extend(data.at_directives.iter().cloned());
        custom_data
            .pseudo_classes
            .extend(data.pseudo_classes.iter().cloned());
        custom_data
            .pseudo_elements
            .extend(data.pseudo_elements.iter().cloned());
    }

    fn do_complete(
        &self,
        document: &TextDocument,
        position: Position,
        stylesheet: &Stylesheet,
    ) -> Result<CompletionList, ServiceError> {
        let offset = document.offset_at(position);
        let in_block = stylesheet
            .root()
            .descendant_for_byte_range(offset, offset)
            .is_some_and(|node| ancestors(node).any(|n| n.kind() == "block"));

        let custom_data = self.custom_data.read().unwrap_or_else(PoisonError::into_inner);
        let items = if in_block {
            completion_items(&custom_data.properties, CompletionItemKind::PROPERTY)
        } else {
            completion_items(&custom_data.at_directives, CompletionItemKind::KEYWORD)
        };

        Ok(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    fn do_hover(
        &self,
        document: &TextDocument,
        position: Position,
        stylesheet: &Stylesheet,
    ) -> Result<Option<Hover>, ServiceError> {
        let offset = document.offset_at(position);
        let Some(node) = stylesheet.root().descendant_for_byte_range(offset, offset) else {
            return Ok(None);
        };
        if node.kind() != "property_name" {
            return Ok(None);
        }

        let name = node_text(document, node);
        let custom_data = self.custom_data.read().unwrap_or_else(PoisonError::into_inner);
        let Some(description) = custom_data
            .properties
            .iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.description.as_ref())
        else {
            return Ok(None);
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: description.as_str().to_string(),
            }),
            range: Some(node_range(document, node)),
        }))
    }

    fn find_document_symbols(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
    ) -> Result<Vec<SymbolInformation>, ServiceError> {
        let mut symbols = Vec::new();
        visit(stylesheet.root(), |node| {
            let symbol = match node.kind() {
                "rule_set" => child_of_kind(node, "selectors")
                    .map(|selectors| (collapse_whitespace(node_text(document, selectors)), SymbolKind::CLASS)),
                "media_statement" | "supports_statement" => {
                    header_text(document, node, "block").map(|name| (name, SymbolKind::MODULE))
                }
                "keyframes_statement" => header_text(document, node, "keyframe_block_list")
                    .map(|name| (name, SymbolKind::FUNCTION)),
                _ => None,
            };

            if let Some((name, kind)) = symbol {
                #[allow(deprecated)]
                let symbol = SymbolInformation {
                    name,
                    kind,
                    tags: None,
                    deprecated: None,
                    location: Location::new(document.uri().clone(), node_range(document, node)),
                    container_name: None,
                };
                symbols.push(symbol);
            }
            true
        });
        Ok(symbols)
    }

    async fn find_document_links(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
        context: &DocumentContext,
    ) -> Result<Vec<DocumentLink>, ServiceError> {
        let references = collect_references(document, stylesheet);

        let mut links = Vec::with_capacity(references.len());
        for reference in references {
            if reference.target.starts_with("data:") || reference.target.starts_with('#') {
                continue;
            }
            let Some(mut target) = context.resolve_reference(&reference.target, None) else {
                continue;
            };
            if self.dialect == Dialect::Scss
                && reference.is_import
                && let Some(partial) = self.resolve_partial(&target).await
            {
                target = partial;
            }

            links.push(DocumentLink {
                range: document.range_of(reference.start, reference.end),
                target: Some(target),
                tooltip: None,
                data: None,
            });
        }
        Ok(links)
    }

    fn find_document_colors(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
    ) -> Result<Vec<ColorInformation>, ServiceError> {
        let mut colors = Vec::new();
        visit(stylesheet.root(), |node| {
            if node.kind() == "color_value"
                && let Some(color) = parse_hex_color(node_text(document, node))
            {
                colors.push(ColorInformation {
                    range: node_range(document, node),
                    color,
                });
            }
            true
        });
        Ok(colors)
    }

    fn get_color_presentations(
        &self,
        _document: &TextDocument,
        _stylesheet: &Stylesheet,
        color: Color,
        range: Range,
    ) -> Result<Vec<ColorPresentation>, ServiceError> {
        Ok(color_labels(color)
            .into_iter()
            .map(|label| ColorPresentation {
                text_edit: Some(TextEdit::new(range, label.clone())),
                label,
                additional_text_edits: None,
            })
            .collect())
    }

    fn get_folding_ranges(
        &self,
        document: &TextDocument,
        stylesheet: &Stylesheet,
        range_limit: usize,
    ) -> Result<Vec<FoldingRange>, ServiceError> {
        let mut ranges = Vec::new();
        visit(stylesheet.root(), |node| {
            let start_line = document.position_at(node.start_byte()).line;
            let end_line = document.position_at(node.end_byte()).line;
            match node.kind() {
                // The closing brace line stays visible
                "block" | "keyframe_block_list" if end_line > start_line + 1 => {
                    ranges.push(FoldingRange {
                        start_line,
                        end_line: end_line - 1,
                        ..Default::default()
                    });
                }
                "comment" if end_line > start_line => {
                    ranges.push(FoldingRange {
                        start_line,
                        end_line,
                        kind: Some(FoldingRangeKind::Comment),
                        ..Default::default()
                    });
                }
                _ => {}
            }
            true
        });
        ranges.sort_by_key(|range| range.start_line);
        ranges.truncate(range_limit);
        Ok(ranges)
    }

    fn get_selection_ranges(
        &self,
        document: &TextDocument,
        positions: &[Position],
        stylesheet: &Stylesheet,
    ) -> Result<Vec<SelectionRange>, ServiceError> {
        Ok(positions
            .iter()
            .map(|position| {
                let offset = document.offset_at(*position);
                let mut ranges: Vec<Range> = Vec::new();
                if let Some(node) = stylesheet.root().descendant_for_byte_range(offset, offset) {
                    for ancestor in std::iter::once(node).chain(ancestors(node)) {
                        let range = node_range(document, ancestor);
                        if ranges.last() != Some(&range) {
                            ranges.push(range);
                        }
                    }
                }

                // Innermost first; parents wrap outward
                ranges.into_iter().rev().fold(None, |parent, range| {
                    Some(SelectionRange {
                        range,
                        parent: parent.map(Box::new),
                    })
                })
                .unwrap_or(SelectionRange {
                    range: Range::new(*position, *position),
                    parent: None,
                })
            })
            .collect())
    }
}

struct Reference {
    target: String,
    start: usize,
    end: usize,
    is_import: bool,
}

fn collect_references(document: &TextDocument, stylesheet: &Stylesheet) -> Vec<Reference> {
    let mut references = Vec::new();
    visit(stylesheet.root(), |node| {
        match node.kind() {
            "import_statement" => {
                if let Some(string) = child_of_kind(node, "string_value")
                    && let Some(reference) = unquoted(document, string.start_byte(), string.end_byte())
                {
                    references.push(Reference {
                        is_import: true,
                        ..reference
                    });
                }
            }
            "call_expression" => {
                let is_url = child_of_kind(node, "function_name")
                    .is_some_and(|name| node_text(document, name).eq_ignore_ascii_case("url"));
                if is_url && let Some(arguments) = child_of_kind(node, "arguments") {
                    // Inside the parentheses
                    let start = arguments.start_byte() + 1;
                    let end = arguments.end_byte().saturating_sub(1).max(start);
                    if let Some(reference) = unquoted(document, start, end) {
                        let is_import = node
                            .parent()
                            .is_some_and(|parent| parent.kind() == "import_statement");
                        references.push(Reference {
                            is_import,
                            ..reference
                        });
                    }
                }
                return false;
            }
            _ => {}
        }
        true
    });
    references
}

/// Trims whitespace and one pair of matching quotes from `text[start..end]`.
fn unquoted(document: &TextDocument, start: usize, end: usize) -> Option<Reference> {
    let raw = document.text().get(start..end)?;
    let leading = raw.len() - raw.trim_start().len();
    let mut start = start + leading;
    let mut end = start + raw.trim().len();
    let trimmed = document.text().get(start..end)?;

    if trimmed.len() >= 2
        && (trimmed.starts_with('"') && trimmed.ends_with('"')
            || trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        start += 1;
        end -= 1;
    }

    let target = document.text().get(start..end)?;
    if target.is_empty() {
        return None;
    }
    Some(Reference {
        target: target.to_string(),
        start,
        end,
        is_import: false,
    })
}

fn completion_items(entries: &[DataEntry], kind: CompletionItemKind) -> Vec<CompletionItem> {
    entries
        .iter()
        .map(|entry| CompletionItem {
            label: entry.name.clone(),
            kind: Some(kind),
            documentation: entry.description.as_ref().map(|description| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: description.as_str().to_string(),
                })
            }),
            ..Default::default()
        })
        .collect()
}

fn parse_hex_color(text: &str) -> Option<Color> {
    let digits = HEX_COLOR.captures(text)?.get(1)?.as_str();
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f32::from(v) / 255.0);
    let short = |i: usize| channel(&digits[i..i + 1].repeat(2));
    let long = |i: usize| channel(&digits[i * 2..i * 2 + 2]);

    match digits.len() {
        3 => Some(Color {
            red: short(0)?,
            green: short(1)?,
            blue: short(2)?,
            alpha: 1.0,
        }),
        4 => Some(Color {
            red: short(0)?,
            green: short(1)?,
            blue: short(2)?,
            alpha: short(3)?,
        }),
        6 => Some(Color {
            red: long(0)?,
            green: long(1)?,
            blue: long(2)?,
            alpha: 1.0,
        }),
        8 => Some(Color {
            red: long(0)?,
            green: long(1)?,
            blue: long(2)?,
            alpha: long(3)?,
        }),
        _ => None,
    }
}

fn color_labels(color: Color) -> Vec<String> {
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let (r, g, b, a) = (
        to_byte(color.red),
        to_byte(color.green),
        to_byte(color.blue),
        to_byte(color.alpha),
    );

    if a == 255 {
        vec![
            format!("#{:02x}{:02x}{:02x}", r, g, b),
            format!("rgb({}, {}, {})", r, g, b),
        ]
    } else {
        let alpha = (color.alpha * 100.0).round() / 100.0;
        vec![
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a),
            format!("rgba({}, {}, {}, {})", r, g, b, alpha),
        ]
    }
}

/// Pre-order walk. `f` returns whether to descend into the node's children.
fn visit<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>) -> bool) {
    let mut cursor = root.walk();
    loop {
        if f(cursor.node()) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn ancestors(node: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    std::iter::successors(node.parent(), |n| n.parent())
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .find(|child| child.kind() == kind)
}

fn is_empty_block(block: Node<'_>) -> bool {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .all(|child| child.kind() == "comment")
}

fn node_text<'d>(document: &'d TextDocument, node: Node<'_>) -> &'d str {
    document
        .text()
        .get(node.start_byte()..node.end_byte())
        .unwrap_or_default()
}

fn node_range(document: &TextDocument, node: Node<'_>) -> Range {
    document.range_of(node.start_byte(), node.end_byte())
}

/// Text of an at-rule up to its body, e.g. `@media screen`
fn header_text(document: &TextDocument, node: Node<'_>, body_kind: &str) -> Option<String> {
    let body = child_of_kind(node, body_kind)?;
    let header = document.text().get(node.start_byte()..body.start_byte())?;
    Some(collapse_whitespace(header))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fs::FileStat;
    use serde_json::json;

    struct FakeFileSystem {
        files: Vec<&'static str>,
    }

    #[async_trait]
    impl FileSystemProvider for FakeFileSystem {
        async fn stat(&self, uri: &Url) -> Result<FileStat, ServiceError> {
            if self.files.contains(&uri.as_str()) {
                Ok(FileStat {
                    file_type: FileType::File,
                    ctime: 0,
                    mtime: 0,
                    size: 1,
                })
            } else {
                Ok(FileStat::missing())
            }
        }
    }

    fn service(dialect: Dialect) -> StylesheetService {
        StylesheetService::new(dialect, Arc::new(FakeFileSystem { files: Vec::new() }))
    }

    fn document(language_id: &str, text: &str) -> TextDocument {
        TextDocument::new(
            Url::parse(&format!("file:///ws/styles/a.{}", language_id)).unwrap(),
            language_id,
            1,
            text,
        )
    }

    fn parse(service: &StylesheetService, document: &TextDocument) -> Stylesheet {
        service.parse_stylesheet(document).unwrap()
    }

    #[test]
    fn validation_reports_empty_rules_as_warning() {
        let service = service(Dialect::Css);
        let doc = document("css", "a { color: red; }\n.empty {}\n");
        let stylesheet = parse(&service, &doc);

        let diagnostics = service.do_validation(&doc, &stylesheet, None).unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(diagnostics[0].message, "Do not use empty rulesets");
        assert_eq!(diagnostics[0].range.start, Position::new(1, 0));
    }

    #[test]
    fn validation_honors_document_settings_over_configured_ones() {
        let service = service(Dialect::Css);
        service.configure(LanguageSettings::from_value(&json!({
            "lint": { "emptyRules": "error" }
        })));
        let doc = document("css", ".empty {}");
        let stylesheet = parse(&service, &doc);

        let configured = service.do_validation(&doc, &stylesheet, None).unwrap();
        assert_eq!(configured[0].severity, Some(DiagnosticSeverity::ERROR));

        let ignore = LanguageSettings::from_value(&json!({ "lint": { "emptyRules": "ignore" } }));
        let overridden = service
            .do_validation(&doc, &stylesheet, ignore.as_ref())
            .unwrap();
        assert!(overridden.is_empty());
    }

    #[test]
    fn validation_disabled_yields_nothing() {
        let service = service(Dialect::Css);
        let doc = document("css", ".empty {} a { color: ");
        let stylesheet = parse(&service, &doc);
        let settings = LanguageSettings {
            validate: false,
            ..Default::default()
        };

        let diagnostics = service
            .do_validation(&doc, &stylesheet, Some(&settings))
            .unwrap();

        assert!(diagnostics.is_empty());
    }

    #[test]
    fn validation_reports_syntax_errors_for_css_only() {
        let source = "a { color: red; }\n}}} {{\n";
        let css = service(Dialect::Css);
        let doc = document("css", source);
        let stylesheet = parse(&css, &doc);

        let diagnostics = css.do_validation(&doc, &stylesheet, None).unwrap();
        assert!(
            diagnostics
                .iter()
                .any(|d| d.severity == Some(DiagnosticSeverity::ERROR))
        );

        let scss = service(Dialect::Scss);
        let doc = document("scss", source);
        let stylesheet = parse(&scss, &doc);
        let diagnostics = scss.do_validation(&doc, &stylesheet, None).unwrap();
        assert!(
            diagnostics
                .iter()
                .all(|d| d.code == Some(NumberOrString::String(EMPTY_RULES.to_string())))
        );
    }

    #[test]
    fn find_document_colors_reads_hex_values() {
        let service = service(Dialect::Css);
        let doc = document("css", "a { color: #ff0000; background: #0f08; }");
        let stylesheet = parse(&service, &doc);

        let colors = service.find_document_colors(&doc, &stylesheet).unwrap();

        assert_eq!(colors.len(), 2);
        assert_eq!(
            colors[0].color,
            Color {
                red: 1.0,
                green: 0.0,
                blue: 0.0,
                alpha: 1.0
            }
        );
        assert_eq!(colors[0].range.start, Position::new(0, 11));
        assert_eq!(colors[1].color.green, 1.0);
        assert!((colors[1].color.alpha - 136.0 / 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn color_presentations_offer_hex_and_rgb() {
        let service = service(Dialect::Css);
        let doc = document("css", "a {}");
        let stylesheet = parse(&service, &doc);
        let range = Range::new(Position::new(0, 0), Position::new(0, 4));

        let opaque = service
            .get_color_presentations(
                &doc,
                &stylesheet,
                Color {
                    red: 1.0,
                    green: 0.0,
                    blue: 0.0,
                    alpha: 1.0,
                },
                range,
            )
            .unwrap();
        let labels: Vec<&str> = opaque.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["#ff0000", "rgb(255, 0, 0)"]);
        assert_eq!(opaque[0].text_edit.as_ref().unwrap().range, range);

        let translucent = service
            .get_color_presentations(
                &doc,
                &stylesheet,
                Color {
                    red: 0.0,
                    green: 0.0,
                    blue: 1.0,
                    alpha: 0.5,
                },
                range,
            )
            .unwrap();
        let labels: Vec<&str> = translucent.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["#0000ff80", "rgba(0, 0, 255, 0.5)"]);
    }

    #[test]
    fn find_document_symbols_lists_rules_and_at_rules() {
        let service = service(Dialect::Css);
        let doc = document(
            "css",
            "a,\n  b { color: red; }\n@media screen {\n  .c { margin: 0; }\n}\n",
        );
        let stylesheet = parse(&service, &doc);

        let symbols = service.find_document_symbols(&doc, &stylesheet).unwrap();

        let names: Vec<(&str, SymbolKind)> =
            symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("a, b", SymbolKind::CLASS),
                ("@media screen", SymbolKind::MODULE),
                (".c", SymbolKind::CLASS),
            ]
        );
        assert_eq!(symbols[2].location.range.start, Position::new(3, 2));
    }

    #[test]
    fn folding_ranges_cover_blocks_and_comments() {
        let service = service(Dialect::Css);
        let doc = document(
            "css",
            "/*\n * header\n */\na {\n  color: red;\n  margin: 0;\n}\nb { color: blue; }\n",
        );
        let stylesheet = parse(&service, &doc);

        let ranges = service.get_folding_ranges(&doc, &stylesheet, usize::MAX).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].start_line, ranges[0].end_line), (0, 2));
        assert_eq!(ranges[0].kind, Some(FoldingRangeKind::Comment));
        assert_eq!((ranges[1].start_line, ranges[1].end_line), (3, 5));

        let limited = service.get_folding_ranges(&doc, &stylesheet, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn selection_ranges_expand_outward() {
        let service = service(Dialect::Css);
        let doc = document("css", "a { color: red; }");
        let stylesheet = parse(&service, &doc);

        let ranges = service
            .get_selection_ranges(&doc, &[Position::new(0, 12)], &stylesheet)
            .unwrap();

        let mut current = Some(&ranges[0]);
        let mut widths = Vec::new();
        while let Some(range) = current {
            widths.push(range.range.end.character - range.range.start.character);
            current = range.parent.as_deref();
        }
        assert!(widths.len() >= 3);
        assert!(widths.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*widths.last().unwrap(), 17);
    }

    #[tokio::test]
    async fn find_document_links_resolves_imports_and_urls() {
        let service = service(Dialect::Css);
        let doc = document(
            "css",
            "@import \"theme.css\";\na { background: url(\"/img/bg.png\"); }\nb { background: url(\"data:image/png;base64,AAAA\"); }\n",
        );
        let stylesheet = parse(&service, &doc);
        let context = DocumentContext::new(
            doc.uri(),
            &[tower_lsp::lsp_types::WorkspaceFolder {
                uri: Url::parse("file:///ws").unwrap(),
                name: "ws".to_string(),
            }],
        );

        let links = service
            .find_document_links(&doc, &stylesheet, &context)
            .await
            .unwrap();

        let targets: Vec<&str> = links
            .iter()
            .map(|l| l.target.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(
            targets,
            vec!["file:///ws/styles/theme.css", "file:///ws/img/bg.png"]
        );
        assert_eq!(
            links[0].range,
            Range::new(Position::new(0, 9), Position::new(0, 18))
        );
    }

    #[tokio::test]
    async fn scss_imports_resolve_to_existing_partials() {
        let service = StylesheetService::new(
            Dialect::Scss,
            Arc::new(FakeFileSystem {
                files: vec!["file:///ws/styles/_variables.scss"],
            }),
        );
        let doc = document("scss", "@import 'variables';\n@import 'missing';\n");
        let stylesheet = parse(&service, &doc);
        let context = DocumentContext::new(doc.uri(), &[]);

        let links = service
            .find_document_links(&doc, &stylesheet, &context)
            .await
            .unwrap();

        let targets: Vec<&str> = links
            .iter()
            .map(|l| l.target.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(
            targets,
            vec![
                "file:///ws/styles/_variables.scss",
                "file:///ws/styles/missing"
            ]
        );
    }

    #[test]
    fn hover_and_completion_use_custom_data() {
        let service = service(Dialect::Css);
        service.add_custom_data(
            &serde_json::from_value(json!({
                "properties": [{ "name": "my-size", "description": "Size of things" }],
                "atDirectives": [{ "name": "@my-rule" }]
            }))
            .unwrap(),
        );
        let doc = document("css", "a { my-size: 1px; }");
        let stylesheet = parse(&service, &doc);

        let hover = service
            .do_hover(&doc, Position::new(0, 6), &stylesheet)
            .unwrap()
            .unwrap();
        assert_eq!(
            hover.contents,
            HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: "Size of things".to_string(),
            })
        );

        let in_block = service
            .do_complete(&doc, Position::new(0, 4), &stylesheet)
            .unwrap();
        assert_eq!(in_block.items[0].label, "my-size");

        let top_level = service
            .do_complete(&doc, Position::new(0, 0), &stylesheet)
            .unwrap();
        assert_eq!(top_level.items[0].label, "@my-rule");
    }

    #[test]
    fn language_services_register_every_dialect() {
        let services = language_services(Arc::new(FakeFileSystem { files: Vec::new() }));

        assert_eq!(services.get("scss").dialect(), Dialect::Scss);
        assert_eq!(services.get("less").dialect(), Dialect::Less);
        assert_eq!(services.get("stylus").dialect(), Dialect::Css);
    }
}
