//! Spreadsheet export.
//!
//! Records are written as CSV with a UTF-8 BOM so spreadsheet tools pick the
//! right encoding. Each establishment gets its own row; a company without
//! establishments still gets one.

use std::path::PathBuf;
use std::sync::Arc;

use domain::errors::DestinationError;
use domain::models::{Company, Destination, Establishment};
use domain::services::SpreadsheetWriter;
use serde_json::json;

use super::{DestinationExecutor, ExecutionRequest, ExecutorResult};

const HEADER: [&str; 15] = [
    "CNPJ",
    "Razão Social",
    "Nome Fantasia",
    "Matriz/Filial",
    "Situação Cadastral",
    "UF",
    "Município",
    "CNAE Principal",
    "Início Atividade",
    "Natureza Jurídica",
    "Porte",
    "Capital Social",
    "Email",
    "Telefone",
    "Celular",
];

/// Writes export artifacts to a local directory.
#[derive(Debug, Clone)]
pub struct FsSpreadsheetWriter {
    dir: PathBuf,
}

impl FsSpreadsheetWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact locations are bare file names inside the export directory.
    fn path_for(&self, location: &str) -> Option<PathBuf> {
        let valid = !location.is_empty()
            && !location.contains(['/', '\\'])
            && location != "."
            && location != "..";
        valid.then(|| self.dir.join(location))
    }
}

#[async_trait::async_trait]
impl SpreadsheetWriter for FsSpreadsheetWriter {
    async fn write(&self, file_name: &str, contents: Vec<u8>) -> Result<String, DestinationError> {
        let path = self
            .path_for(file_name)
            .ok_or_else(|| DestinationError::Artifact(format!("Invalid file name {}", file_name)))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DestinationError::Artifact(e.to_string()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| DestinationError::Artifact(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Export artifact written");
        Ok(file_name.to_string())
    }

    async fn read(&self, location: &str) -> Result<Option<Vec<u8>>, DestinationError> {
        let Some(path) = self.path_for(location) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DestinationError::Artifact(e.to_string())),
        }
    }
}

/// Serializes records into a spreadsheet artifact.
pub struct FileExecutor {
    writer: Arc<dyn SpreadsheetWriter>,
}

impl FileExecutor {
    pub fn new(writer: Arc<dyn SpreadsheetWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait::async_trait]
impl DestinationExecutor for FileExecutor {
    fn destination(&self) -> Destination {
        Destination::File
    }

    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> Result<ExecutorResult, DestinationError> {
        let contents = generate_csv(request.records);
        let rows: usize = request
            .records
            .iter()
            .map(|c| c.establishments.len().max(1))
            .sum();
        let file_name = format!("empresas_{}.csv", request.job.id);

        let location = self.writer.write(&file_name, contents.into_bytes()).await?;

        Ok(ExecutorResult {
            delivered_count: request.records.len(),
            delivered_keys: request
                .records
                .iter()
                .map(|c| c.registration_key.clone())
                .collect(),
            acknowledgment: Some(json!({ "fileName": location, "rows": rows })),
            output_location: Some(location),
        })
    }
}

/// Generates the CSV artifact for `records`.
pub fn generate_csv(records: &[Company]) -> String {
    let mut csv = String::from('\u{FEFF}');
    csv.push_str(&HEADER.join(","));
    csv.push('\n');

    for company in records {
        if company.establishments.is_empty() {
            push_row(&mut csv, company, None);
        }
        for establishment in &company.establishments {
            push_row(&mut csv, company, Some(establishment));
        }
    }
    csv
}

fn push_row(csv: &mut String, company: &Company, establishment: Option<&Establishment>) {
    let cnpj = establishment
        .map(|e| e.formatted_cnpj())
        .unwrap_or_else(|| company.registration_key.clone());
    let branch = match establishment {
        Some(e) if e.head_office => "Matriz",
        Some(_) => "Filial",
        None => "",
    };
    let opened_on = establishment
        .and_then(|e| e.opened_on)
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default();
    let share_capital = company
        .share_capital
        .map(|v| format!("{:.2}", v))
        .unwrap_or_default();
    let activity = establishment
        .and_then(Establishment::primary_activity_label)
        .unwrap_or_default();

    let fields = [
        cnpj.as_str(),
        company.legal_name.as_str(),
        establishment
            .and_then(|e| e.trade_name.as_deref())
            .unwrap_or(""),
        branch,
        establishment
            .and_then(|e| e.registration_status.as_deref())
            .unwrap_or(""),
        establishment.and_then(|e| e.state.as_deref()).unwrap_or(""),
        establishment
            .and_then(|e| e.municipality.as_deref())
            .unwrap_or(""),
        activity.as_str(),
        opened_on.as_str(),
        company.legal_nature.as_deref().unwrap_or(""),
        company.size_code.as_deref().unwrap_or(""),
        share_capital.as_str(),
        company.email.as_deref().unwrap_or(""),
        company.landline.as_deref().unwrap_or(""),
        company.mobile.as_deref().unwrap_or(""),
    ];

    let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
    csv.push_str(&row.join(","));
    csv.push('\n');
}

/// Escape a value for CSV format.
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::{ExportJob, ExportJobStatus};
    use domain::services::MemorySpreadsheetWriter;
    use uuid::Uuid;

    fn company(key: &str, establishments: Vec<Establishment>) -> Company {
        Company {
            registration_key: key.to_string(),
            legal_name: format!("Empresa {}, Ltda", key),
            legal_nature: Some("2062".to_string()),
            size_code: Some("03".to_string()),
            share_capital: Some(1500.5),
            active: true,
            email: Some("contato@empresa.com.br".to_string()),
            landline: None,
            mobile: None,
            sent_to_crm: false,
            sent_to_mailing: false,
            establishments,
            partners: Vec::new(),
            tax_regime: None,
        }
    }

    fn establishment(cnpj: &str, head_office: bool) -> Establishment {
        Establishment {
            cnpj: cnpj.to_string(),
            head_office,
            trade_name: Some("Padaria \"Boa\"".to_string()),
            registration_status: Some("02".to_string()),
            state: Some("SP".to_string()),
            municipality: Some("7107".to_string()),
            primary_activity: Some("1091102".to_string()),
            primary_activity_description: None,
            opened_on: chrono::NaiveDate::from_ymd_opt(2010, 5, 4),
        }
    }

    fn job() -> ExportJob {
        let now = Utc::now();
        ExportJob {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Leads".to_string(),
            destination: Destination::File,
            status: ExportJobStatus::Processing,
            output_location: None,
            record_count: 0,
            filter_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello,world"), "\"hello,world\"");
        assert_eq!(escape_csv("hello\"world"), "\"hello\"\"world\"");
        assert_eq!(escape_csv("hello\nworld"), "\"hello\nworld\"");
    }

    #[test]
    fn test_csv_has_bom_and_one_row_per_establishment() {
        let records = vec![
            company(
                "12345678",
                vec![
                    establishment("12345678000195", true),
                    establishment("12345678000276", false),
                ],
            ),
            company("87654321", Vec::new()),
        ];

        let csv = generate_csv(&records);
        assert!(csv.starts_with('\u{FEFF}'));

        let lines: Vec<&str> = csv.trim_start_matches('\u{FEFF}').lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("CNPJ,Razão Social"));
        assert!(lines[1].starts_with("12.345.678/0001-95,\"Empresa 12345678, Ltda\""));
        assert!(lines[1].contains("\"Padaria \"\"Boa\"\"\",Matriz"));
        assert!(lines[1].contains("04/05/2010"));
        assert!(lines[1].contains("1500.50"));
        assert!(lines[2].contains(",Filial,"));
        assert!(lines[3].starts_with("87654321,"));
    }

    #[test]
    fn test_activity_column_includes_description() {
        let mut described = establishment("12345678000195", true);
        described.primary_activity_description =
            Some("Fabricação de produtos de padaria e confeitaria, com revenda".to_string());
        let records = vec![
            company("12345678", vec![described]),
            company("87654321", vec![establishment("87654321000110", true)]),
        ];

        let csv = generate_csv(&records);
        let lines: Vec<&str> = csv.trim_start_matches('\u{FEFF}').lines().collect();
        let activity = "\"1091102 - Fabricação de produtos de padaria e confeitaria, com revenda\"";
        assert!(lines[1].contains(&format!("7107,{},04/05/2010", activity)));
        assert!(lines[2].contains(",1091102,"));
    }

    #[tokio::test]
    async fn test_file_executor_writes_artifact() {
        let writer = Arc::new(MemorySpreadsheetWriter::new());
        let executor = FileExecutor::new(writer.clone());
        let job = job();
        let records = vec![company("12345678", vec![establishment("12345678000195", true)])];

        let result = executor
            .execute(ExecutionRequest {
                job: &job,
                list_name: None,
                supplied_name: None,
                records: &records,
            })
            .await
            .unwrap();

        let expected = format!("empresas_{}.csv", job.id);
        assert_eq!(result.delivered_count, 1);
        assert_eq!(result.output_location.as_deref(), Some(expected.as_str()));
        assert_eq!(writer.file_names(), vec![expected]);
        assert_eq!(result.acknowledgment.unwrap()["rows"], 1);
    }

    #[tokio::test]
    async fn test_fs_writer_round_trip() {
        let dir = std::env::temp_dir().join(format!("prospect-export-{}", Uuid::new_v4()));
        let writer = FsSpreadsheetWriter::new(&dir);

        let location = writer.write("leads.csv", b"a,b\n".to_vec()).await.unwrap();
        assert_eq!(location, "leads.csv");
        assert_eq!(writer.read("leads.csv").await.unwrap(), Some(b"a,b\n".to_vec()));
        assert_eq!(writer.read("missing.csv").await.unwrap(), None);
        assert_eq!(writer.read("../leads.csv").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_fs_writer_rejects_nested_names() {
        let writer = FsSpreadsheetWriter::new(std::env::temp_dir());
        let err = writer.write("a/b.csv", Vec::new()).await.unwrap_err();
        assert!(matches!(err, DestinationError::Artifact(_)));
    }
}
