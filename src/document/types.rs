use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DocumentId = i64;
pub type ClientId = i64;

/// Business nature of a document. Codes are stable wire/storage values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    ContractSocial,
    ContractAmendment,
    NegativeCertificate,
    TaxGuide,
    BalanceSheet,
    IncomeStatement,
    Payroll,
    IrDeclaration,
    Permit,
    License,
    PowerOfAttorney,
    AccountingReport,
    FiscalDocument,
    Other,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 14] = [
        DocumentKind::ContractSocial,
        DocumentKind::ContractAmendment,
        DocumentKind::NegativeCertificate,
        DocumentKind::TaxGuide,
        DocumentKind::BalanceSheet,
        DocumentKind::IncomeStatement,
        DocumentKind::Payroll,
        DocumentKind::IrDeclaration,
        DocumentKind::Permit,
        DocumentKind::License,
        DocumentKind::PowerOfAttorney,
        DocumentKind::AccountingReport,
        DocumentKind::FiscalDocument,
        DocumentKind::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DocumentKind::ContractSocial => "contract_social",
            DocumentKind::ContractAmendment => "contract_amendment",
            DocumentKind::NegativeCertificate => "negative_certificate",
            DocumentKind::TaxGuide => "tax_guide",
            DocumentKind::BalanceSheet => "balance_sheet",
            DocumentKind::IncomeStatement => "income_statement",
            DocumentKind::Payroll => "payroll",
            DocumentKind::IrDeclaration => "ir_declaration",
            DocumentKind::Permit => "permit",
            DocumentKind::License => "license",
            DocumentKind::PowerOfAttorney => "power_of_attorney",
            DocumentKind::AccountingReport => "accounting_report",
            DocumentKind::FiscalDocument => "fiscal_document",
            DocumentKind::Other => "other",
        }
    }

    /// Human label shown to clients in subject lines and e-mail bodies.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::ContractSocial => "Contrato Social",
            DocumentKind::ContractAmendment => "Alteração Contratual",
            DocumentKind::NegativeCertificate => "Certidão Negativa",
            DocumentKind::TaxGuide => "Guia de Impostos",
            DocumentKind::BalanceSheet => "Balanço Patrimonial",
            DocumentKind::IncomeStatement => "DRE - Demonstração do Resultado",
            DocumentKind::Payroll => "Folha de Pagamento",
            DocumentKind::IrDeclaration => "Declaração de IR",
            DocumentKind::Permit => "Alvará",
            DocumentKind::License => "Licença",
            DocumentKind::PowerOfAttorney => "Procuração",
            DocumentKind::AccountingReport => "Relatório Contábil",
            DocumentKind::FiscalDocument => "Documento Fiscal",
            DocumentKind::Other => "Outros",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown document kind: {0}")]
pub struct UnknownDocumentKind(pub String);

impl FromStr for DocumentKind {
    type Err = UnknownDocumentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == s)
            .ok_or_else(|| UnknownDocumentKind(s.to_string()))
    }
}

/// Recipient of document notifications. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    /// May be empty; an empty address means the client cannot be notified.
    #[serde(default)]
    pub email: String,
}

impl Client {
    pub fn new(id: ClientId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: String::new(),
            email: email.into(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    /// Full name when present, username otherwise.
    pub fn display_name(&self) -> &str {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            &self.username
        } else {
            full_name
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// A document uploaded by staff for a client.
///
/// `notification_sent_at` is set exactly when `notification_sent` is true, and
/// `notification_sent` never goes back to false once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDocument {
    pub id: DocumentId,
    pub client_id: ClientId,
    pub uploaded_by: Option<i64>,
    pub kind: DocumentKind,
    pub title: String,
    pub description: Option<String>,
    /// Storage reference of the artifact. Never leaves the portal.
    pub file_ref: String,
    pub created_at: DateTime<Utc>,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Fields supplied by the staff upload path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub client_id: ClientId,
    pub uploaded_by: Option<i64>,
    pub kind: DocumentKind,
    pub title: String,
    pub description: Option<String>,
    pub file_ref: String,
    /// Defaults to insert time when absent
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewDocument {
    pub fn new(
        client_id: ClientId,
        kind: DocumentKind,
        title: impl Into<String>,
        file_ref: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            uploaded_by: None,
            kind,
            title: title.into(),
            description: None,
            file_ref: file_ref.into(),
            created_at: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn uploaded_by(mut self, staff_id: i64) -> Self {
        self.uploaded_by = Some(staff_id);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Partial update of the descriptive fields of a document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    /// Use `Some(None)` to clear the description
    pub description: Option<Option<String>>,
    pub kind: Option<DocumentKind>,
}

/// Data-layer save event. `created` distinguishes inserts from updates.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    pub document: ClientDocument,
    pub recipient: Client,
    pub created: bool,
}

impl DocumentEvent {
    pub fn created(document: ClientDocument, recipient: Client) -> Self {
        Self {
            document,
            recipient,
            created: true,
        }
    }

    pub fn updated(document: ClientDocument, recipient: Client) -> Self {
        Self {
            document,
            recipient,
            created: false,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.code().parse::<DocumentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_serde_matches_code() {
        let json = serde_json::to_string(&DocumentKind::PowerOfAttorney).unwrap();
        assert_eq!(json, "\"power_of_attorney\"");

        let kind: DocumentKind = serde_json::from_str("\"ir_declaration\"").unwrap();
        assert_eq!(kind, DocumentKind::IrDeclaration);
    }

    #[test]
    fn test_unknown_kind() {
        let err = "invoice".parse::<DocumentKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown document kind: invoice");
    }

    #[test]
    fn test_balance_sheet_label() {
        assert_eq!(DocumentKind::BalanceSheet.label(), "Balanço Patrimonial");
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let client = Client::new(42, "ana", "ana@example.com").with_full_name("Ana Costa");
        assert_eq!(client.display_name(), "Ana Costa");

        let client = Client::new(43, "bruno", "bruno@example.com").with_full_name("  ");
        assert_eq!(client.display_name(), "bruno");
    }

    #[test]
    fn test_has_email_ignores_whitespace() {
        assert!(!Client::new(99, "sem_email", "").has_email());
        assert!(!Client::new(99, "sem_email", "   ").has_email());
        assert!(Client::new(1, "c", "c@example.com").has_email());
    }
}
