use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use pactflow::models::contract::parse_form_date;
use pactflow::models::{ContractField, ValidationError};
use pactflow::notification::TracingNotificationSink;
use pactflow::preferences::{JsonFilePreferences, NotificationSettings};
use pactflow::presentation::ContractRow;
use pactflow::{
    Config, Contract, ContractForm, ContractStore, HttpContractGateway, NotificationDispatcher,
};

#[derive(Parser)]
#[command(name = "pactflow", about = "Manage contracts on a PactFlow server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List contracts, optionally filtered by a search query
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a single contract
    Show { id: i64 },
    /// Create a new contract
    Create(ContractArgs),
    /// Update an existing contract; omitted fields keep their current value
    Update {
        id: i64,
        #[command(flatten)]
        fields: ContractArgs,
    },
    /// Delete a contract
    Delete { id: i64 },
    /// Notification settings
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
}

#[derive(Args)]
struct ContractArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long = "type")]
    contract_type: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// yyyy-MM-dd
    #[arg(long)]
    start: Option<String>,
    /// yyyy-MM-dd
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    workflow_id: Option<i64>,
    #[arg(long)]
    finalized: bool,
}

#[derive(Subcommand)]
enum NotificationAction {
    Status,
    On,
    Off,
    /// Send a demo notification
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pactflow=info")),
        )
        .init();

    let cli = Cli::parse();

    let preferences = Arc::new(JsonFilePreferences::new(config.preferences_path.clone()));
    let settings = NotificationSettings::new(preferences);
    let dispatcher = NotificationDispatcher::new(settings.clone(), Arc::new(TracingNotificationSink));
    let gateway = Arc::new(HttpContractGateway::new(&config)?);
    tracing::debug!(api_url = gateway.base_url(), "Using contract server");
    let store = ContractStore::new(gateway, dispatcher.clone());

    match cli.command {
        Command::List { search } => {
            store.load_contracts().await?;
            if let Some(query) = search {
                store.search_contracts(&query);
            }
            print_rows(&store.contracts());
        }
        Command::Show { id } => {
            let contract = store.get_contract_by_id(id).await?;
            print_details(&contract);
        }
        Command::Create(fields) => {
            let contract = fields.into_form().into_contract().map_err(field_error)?;
            let created = store.create_contract(contract).await?;
            println!("Created contract {}", display_id(&created));
            print_details(&created);
        }
        Command::Update { id, fields } => {
            let current = store.get_contract_by_id(id).await?;
            let edited = fields.apply_to(current).map_err(field_error)?;
            let updated = store.update_contract(id, edited).await?;
            println!("Updated contract {} (version {})", id, updated.version);
        }
        Command::Delete { id } => {
            store.delete_contract(id).await?;
            println!("Deleted contract {}", id);
            if let Some(message) = store.error_message() {
                eprintln!("Could not refresh contract list: {}", message);
            }
        }
        Command::Notifications { action } => match action {
            NotificationAction::Status => {
                let state = if settings.notifications_enabled() { "enabled" } else { "disabled" };
                println!("Notifications are {}", state);
            }
            NotificationAction::On => {
                settings.set_notifications_enabled(true)?;
                println!("Notifications enabled");
            }
            NotificationAction::Off => {
                settings.set_notifications_enabled(false)?;
                println!("Notifications disabled");
            }
            NotificationAction::Demo => {
                if !dispatcher.send_demo_notification() {
                    println!("Notifications are disabled in settings");
                }
            }
        },
    }

    Ok(())
}

impl ContractArgs {
    fn into_form(self) -> ContractForm {
        ContractForm {
            title: self.title.unwrap_or_default(),
            amount: self.amount.unwrap_or_default(),
            contract_type: self.contract_type.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            start_date: self.start.unwrap_or_default(),
            end_date: self.end.unwrap_or_default(),
            template: self.template,
            workflow_id: self.workflow_id,
            finalized: self.finalized,
        }
    }

    fn apply_to(self, mut contract: Contract) -> Result<Contract, ValidationError> {
        if let Some(title) = self.title {
            contract.title = title.trim().to_string();
        }
        if let Some(amount) = self.amount {
            contract.amount = Decimal::from_str(amount.trim()).map_err(|_| {
                ValidationError::new(ContractField::Amount, "Please enter a valid amount")
            })?;
        }
        if let Some(contract_type) = self.contract_type {
            contract.contract_type = contract_type.trim().to_string();
        }
        if let Some(description) = self.description {
            contract.description = description.trim().to_string();
        }
        if let Some(start) = self.start {
            contract.start_date = parse_form_date(&start, ContractField::StartDate)?;
        }
        if let Some(end) = self.end {
            contract.end_date = parse_form_date(&end, ContractField::EndDate)?;
        }
        if self.template.is_some() {
            contract.template = self.template;
        }
        if self.workflow_id.is_some() {
            contract.workflow_id = self.workflow_id;
        }
        if self.finalized {
            contract.finalized = true;
        }
        Ok(contract)
    }
}

fn field_error(error: ValidationError) -> anyhow::Error {
    anyhow::anyhow!("{} (field: {})", error.message, error.field)
}

fn display_id(contract: &Contract) -> String {
    contract
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_rows(contracts: &[Contract]) {
    if contracts.is_empty() {
        println!("No contracts found");
        return;
    }

    for contract in contracts {
        let row = ContractRow::from(contract);
        println!(
            "{:>5}  {:<30} {:>14}  {:<16} {:<28} {}",
            display_id(contract),
            row.title,
            row.amount,
            row.contract_type,
            row.dates,
            row.status_badge.unwrap_or("")
        );
    }
}

fn print_details(contract: &Contract) {
    let row = ContractRow::from(contract);
    println!("Id:          {}", display_id(contract));
    println!("Title:       {}", row.title);
    println!("Amount:      {}", row.amount);
    println!("Type:        {}", row.contract_type);
    println!("Description: {}", contract.description);
    println!("Dates:       {}", row.dates);
    println!("Status:      {}", contract.status().label());
    println!("Version:     {}", contract.version);
    if let Some(template) = &contract.template {
        println!("Template:    {}", template);
    }
}
