//! Schema command - print expected input formats

use crate::cmd::AssessmentInput;
use crate::core::LineItem;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema, csv-header or csv-fields
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the assessment input
    JsonSchema,
    /// CSV header row for line items
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(AssessmentInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => {
                let names: Vec<_> = LineItem::csv_schema().iter().map(|f| f.name).collect();
                println!("{}", names.join(","));
            }
            SchemaFormat::CsvFields => {
                println!("Line Item CSV Format");
                println!("====================");
                println!();
                for field in LineItem::csv_schema() {
                    let req = if field.required { "required" } else { "optional" };
                    println!("{:16} ({:8})  {}", field.name, req, field.description);
                }
                println!();
                println!("Amounts are in BRL; NCM may contain dots; CST may carry the origin digit.");
            }
        }
        Ok(())
    }
}
