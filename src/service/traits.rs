//! LanguageService trait for analysis engines

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    CodeActionContext, CodeActionOrCommand, Color, ColorInformation, ColorPresentation,
    CompletionList, Diagnostic, DocumentHighlight, DocumentLink, FoldingRange, Hover, Location,
    Position, Range, SelectionRange, SymbolInformation, WorkspaceEdit,
};

use crate::document::TextDocument;
use crate::service::context::DocumentContext;
use crate::service::error::ServiceError;
use crate::service::types::{CustomData, LanguageSettings};

/// An analysis engine for one stylesheet language.
///
/// The engine produces an opaque [`LanguageService::Stylesheet`] artifact from
/// a document and answers queries against it. Query operations default to an
/// empty result so an engine only implements what it supports.
#[async_trait]
pub trait LanguageService: Send + Sync + 'static {
    /// Parsed representation of a document
    type Stylesheet: Send + Sync + 'static;

    fn parse_stylesheet(&self, document: &TextDocument) -> Result<Self::Stylesheet, ServiceError>;

    /// `settings` overrides whatever was last passed to [`LanguageService::configure`].
    fn do_validation(
        &self,
        document: &TextDocument,
        stylesheet: &Self::Stylesheet,
        settings: Option<&LanguageSettings>,
    ) -> Result<Vec<Diagnostic>, ServiceError>;

    /// Replaces the engine-wide settings snapshot.
    fn configure(&self, settings: Option<LanguageSettings>);

    fn add_custom_data(&self, _data: &CustomData) {}

    fn do_complete(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<CompletionList, ServiceError> {
        Ok(CompletionList::default())
    }

    fn do_hover(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Option<Hover>, ServiceError> {
        Ok(None)
    }

    fn find_document_symbols(
        &self,
        _document: &TextDocument,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<SymbolInformation>, ServiceError> {
        Ok(Vec::new())
    }

    fn find_definition(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Option<Location>, ServiceError> {
        Ok(None)
    }

    fn find_references(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<Location>, ServiceError> {
        Ok(Vec::new())
    }

    fn find_document_highlights(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<DocumentHighlight>, ServiceError> {
        Ok(Vec::new())
    }

    /// Links may need filesystem lookups, hence async.
    async fn find_document_links(
        &self,
        _document: &TextDocument,
        _stylesheet: &Self::Stylesheet,
        _context: &DocumentContext,
    ) -> Result<Vec<DocumentLink>, ServiceError> {
        Ok(Vec::new())
    }

    fn do_code_actions(
        &self,
        _document: &TextDocument,
        _range: Range,
        _context: &CodeActionContext,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<CodeActionOrCommand>, ServiceError> {
        Ok(Vec::new())
    }

    fn find_document_colors(
        &self,
        _document: &TextDocument,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<ColorInformation>, ServiceError> {
        Ok(Vec::new())
    }

    fn get_color_presentations(
        &self,
        _document: &TextDocument,
        _stylesheet: &Self::Stylesheet,
        _color: Color,
        _range: Range,
    ) -> Result<Vec<ColorPresentation>, ServiceError> {
        Ok(Vec::new())
    }

    fn do_rename(
        &self,
        _document: &TextDocument,
        _position: Position,
        _new_name: &str,
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Option<WorkspaceEdit>, ServiceError> {
        Ok(None)
    }

    fn get_folding_ranges(
        &self,
        _document: &TextDocument,
        _stylesheet: &Self::Stylesheet,
        _range_limit: usize,
    ) -> Result<Vec<FoldingRange>, ServiceError> {
        Ok(Vec::new())
    }

    fn get_selection_ranges(
        &self,
        _document: &TextDocument,
        _positions: &[Position],
        _stylesheet: &Self::Stylesheet,
    ) -> Result<Vec<SelectionRange>, ServiceError> {
        Ok(Vec::new())
    }
}
