use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crm_app_lib::config::{AppConfig, BackendKind};
use crm_app_lib::customers::CustomerOrder;
use crm_app_lib::document::{DocumentDraft, LineItemInput};
use crm_app_lib::format::{format_currency, today_ymd};
use crm_app_lib::logging::init_logging;
use crm_app_lib::model::{CustomerPatch, DocumentKind, EstimateStatus, InvoiceStatus, NewCustomer, NewPayment, PaymentMethod};
use crm_app_lib::pdf::{self, DocumentPdf};
use crm_app_lib::Crm;

mod output;

#[derive(Parser, Debug)]
#[command(name = "crm", about = "Customers, estimates, invoices and payments")]
struct Cli {
  /// Overrides CRM_BACKEND.
  #[arg(long, global = true)]
  backend: Option<BackendKind>,

  /// Overrides CRM_DATABASE_PATH.
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Print records as JSON instead of tables.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  #[command(subcommand)]
  Customers(CustomerCommand),
  #[command(subcommand)]
  Estimates(EstimateCommand),
  #[command(subcommand)]
  Invoices(InvoiceCommand),
  #[command(subcommand)]
  Payments(PaymentCommand),
  Dashboard,
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
  List {
    /// Sort by name instead of newest first.
    #[arg(long)]
    by_name: bool,
  },
  Add {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },
  Update {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },
  Delete {
    id: String,
  },
}

#[derive(Args, Debug)]
struct DraftArgs {
  #[arg(long)]
  customer: String,
  #[arg(long)]
  tech: String,
  /// Document date, YYYY-MM-DD. Defaults to today.
  #[arg(long)]
  date: Option<String>,
  /// Use this number instead of the next free one.
  #[arg(long)]
  number: Option<String>,
  #[arg(long)]
  notes: Option<String>,
  /// "description|material|labor", repeatable.
  #[arg(long = "item", value_parser = parse_item, required = true)]
  items: Vec<LineItemInput>,
}

impl DraftArgs {
  fn into_draft(self) -> DocumentDraft {
    DocumentDraft {
      number: self.number,
      customer_id: self.customer,
      date: self.date.unwrap_or_else(today_ymd),
      tech_name: self.tech,
      notes: self.notes,
      items: self.items,
      ..DocumentDraft::new()
    }
  }
}

#[derive(Args, Debug)]
struct PdfArgs {
  id: String,
  /// Directory the PDF is written to.
  #[arg(long, default_value = ".")]
  out: PathBuf,
  /// Send the written file to the printer.
  #[arg(long)]
  print: bool,
}

#[derive(Subcommand, Debug)]
enum EstimateCommand {
  List,
  NextNumber,
  Create {
    #[command(flatten)]
    draft: DraftArgs,
    #[arg(long)]
    expires: Option<String>,
    #[arg(long, default_value = "draft")]
    status: EstimateStatus,
  },
  Status {
    id: String,
    status: EstimateStatus,
  },
  Delete {
    id: String,
  },
  Pdf(PdfArgs),
  /// The plain single-column layout.
  Preview(PdfArgs),
}

#[derive(Subcommand, Debug)]
enum InvoiceCommand {
  List,
  /// Invoices that are neither paid nor cancelled.
  Open,
  NextNumber,
  Create {
    #[command(flatten)]
    draft: DraftArgs,
    /// Due date, YYYY-MM-DD.
    #[arg(long)]
    due: String,
    /// Date the work was completed, YYYY-MM-DD.
    #[arg(long)]
    work_completed: String,
    #[arg(long, default_value = "draft")]
    status: InvoiceStatus,
  },
  Status {
    id: String,
    status: InvoiceStatus,
  },
  Delete {
    id: String,
  },
  Pdf(PdfArgs),
  /// The plain single-column layout.
  Preview(PdfArgs),
}

#[derive(Subcommand, Debug)]
enum PaymentCommand {
  List,
  Record {
    #[arg(long)]
    invoice: String,
    #[arg(long)]
    amount: f64,
    /// Defaults to today.
    #[arg(long)]
    date: Option<String>,
    #[arg(long, default_value = "cash")]
    method: PaymentMethod,
    #[arg(long)]
    reference: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },
  Delete {
    id: String,
  },
}

/// `description|material|labor`; missing costs are blank.
fn parse_item(raw: &str) -> Result<LineItemInput, String> {
  let mut parts = raw.splitn(3, '|');
  let description = parts.next().unwrap_or_default().trim();
  if description.is_empty() {
    return Err("item needs a description: \"description|material|labor\"".to_string());
  }
  let material = parts.next().unwrap_or_default().trim();
  let labor = parts.next().unwrap_or_default().trim();
  Ok(LineItemInput::new(description, material, labor))
}

async fn save_pdf(pdf: DocumentPdf, args: &PdfArgs) -> anyhow::Result<()> {
  let path = pdf::write_pdf(&args.out, &pdf)
    .await
    .with_context(|| format!("writing {}", pdf.filename))?;
  println!("{}", path.display());
  if args.print {
    pdf::print_pdf(&path)
      .await
      .with_context(|| format!("printing {}", path.display()))?;
  }
  Ok(())
}

async fn customers(crm: &Crm, json: bool, command: CustomerCommand) -> anyhow::Result<()> {
  match command {
    CustomerCommand::List { by_name } => {
      let order = if by_name { CustomerOrder::Name } else { CustomerOrder::Newest };
      let list = crm.list_customers(order).await.context("listing customers")?;
      output::customers(&list, json)?;
    }
    CustomerCommand::Add { name, email, phone, address, notes } => {
      let customer = crm
        .create_customer(&NewCustomer { name, email, phone, address, notes })
        .await
        .context("adding customer")?;
      output::customers(&[customer], json)?;
    }
    CustomerCommand::Update { id, name, email, phone, address, notes } => {
      let customer = crm
        .update_customer(&id, &CustomerPatch { name, email, phone, address, notes })
        .await
        .with_context(|| format!("updating customer {id}"))?;
      output::customers(&[customer], json)?;
    }
    CustomerCommand::Delete { id } => {
      crm.delete_customer(&id).await.with_context(|| format!("deleting customer {id}"))?;
      println!("deleted customer {id}");
    }
  }
  Ok(())
}

async fn estimates(crm: &Crm, config: &AppConfig, json: bool, command: EstimateCommand) -> anyhow::Result<()> {
  match command {
    EstimateCommand::List => {
      let list = crm.list_estimates().await.context("listing estimates")?;
      output::estimates(&list, json)?;
    }
    EstimateCommand::NextNumber => {
      println!("{}", crm.preview_document_number(DocumentKind::Estimate).await);
    }
    EstimateCommand::Create { draft, expires, status } => {
      let mut draft = draft.into_draft();
      draft.due_date = expires;
      let doc = crm.create_estimate(&draft, status).await.context("creating estimate")?;
      output::estimates(std::slice::from_ref(&doc.estimate), json)?;
    }
    EstimateCommand::Status { id, status } => {
      let estimate = crm
        .set_estimate_status(&id, status)
        .await
        .with_context(|| format!("updating estimate {id}"))?;
      output::estimates(&[estimate], json)?;
    }
    EstimateCommand::Delete { id } => {
      crm.delete_estimate(&id).await.with_context(|| format!("deleting estimate {id}"))?;
      println!("deleted estimate {id}");
    }
    EstimateCommand::Pdf(args) => {
      let pdf = crm
        .estimate_pdf(&args.id, config)
        .await
        .with_context(|| format!("building estimate {} pdf", args.id))?;
      save_pdf(pdf, &args).await?;
    }
    EstimateCommand::Preview(args) => {
      let pdf = crm
        .preview_pdf(DocumentKind::Estimate, &args.id)
        .await
        .with_context(|| format!("building estimate {} preview", args.id))?;
      save_pdf(pdf, &args).await?;
    }
  }
  Ok(())
}

async fn invoices(crm: &Crm, config: &AppConfig, json: bool, command: InvoiceCommand) -> anyhow::Result<()> {
  match command {
    InvoiceCommand::List => {
      let list = crm.list_invoices().await.context("listing invoices")?;
      output::invoices(&list, json)?;
    }
    InvoiceCommand::Open => {
      let list = crm.open_invoices().await.context("listing open invoices")?;
      output::invoices(&list, json)?;
    }
    InvoiceCommand::NextNumber => {
      println!("{}", crm.preview_document_number(DocumentKind::Invoice).await);
    }
    InvoiceCommand::Create { draft, due, work_completed, status } => {
      let mut draft = draft.into_draft();
      draft.due_date = Some(due);
      draft.work_completed_date = Some(work_completed);
      let doc = crm.create_invoice(&draft, status).await.context("creating invoice")?;
      output::invoices(std::slice::from_ref(&doc.invoice), json)?;
    }
    InvoiceCommand::Status { id, status } => {
      let invoice = crm
        .set_invoice_status(&id, status)
        .await
        .with_context(|| format!("updating invoice {id}"))?;
      output::invoices(&[invoice], json)?;
    }
    InvoiceCommand::Delete { id } => {
      crm.delete_invoice(&id).await.with_context(|| format!("deleting invoice {id}"))?;
      println!("deleted invoice {id}");
    }
    InvoiceCommand::Pdf(args) => {
      let pdf = crm
        .invoice_pdf(&args.id, config)
        .await
        .with_context(|| format!("building invoice {} pdf", args.id))?;
      save_pdf(pdf, &args).await?;
    }
    InvoiceCommand::Preview(args) => {
      let pdf = crm
        .preview_pdf(DocumentKind::Invoice, &args.id)
        .await
        .with_context(|| format!("building invoice {} preview", args.id))?;
      save_pdf(pdf, &args).await?;
    }
  }
  Ok(())
}

async fn payments(crm: &Crm, json: bool, command: PaymentCommand) -> anyhow::Result<()> {
  match command {
    PaymentCommand::List => {
      let list = crm.list_payments().await.context("listing payments")?;
      output::payments(&list, json)?;
    }
    PaymentCommand::Record { invoice, amount, date, method, reference, notes } => {
      let payment = crm
        .record_payment(&NewPayment {
          invoice_id: invoice.clone(),
          payment_date: date.unwrap_or_else(today_ymd),
          amount,
          payment_method: method,
          reference_number: reference,
          notes,
        })
        .await
        .with_context(|| format!("recording payment for invoice {invoice}"))?;
      println!("recorded {} payment {}", format_currency(payment.amount), payment.id);
    }
    PaymentCommand::Delete { id } => {
      crm.delete_payment(&id).await.with_context(|| format!("deleting payment {id}"))?;
      println!("deleted payment {id}");
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let mut config = AppConfig::from_env().context("reading configuration")?;
  if let Some(backend) = cli.backend {
    config.backend = backend;
  }
  if let Some(db) = cli.db {
    config.database_path = db;
  }
  init_logging(&config.log_filter, config.log_json);
  tracing::debug!(backend = ?config.backend, "starting");

  let crm = Crm::connect(&config).context("opening the data store")?;

  match cli.command {
    Command::Customers(command) => customers(&crm, cli.json, command).await,
    Command::Estimates(command) => estimates(&crm, &config, cli.json, command).await,
    Command::Invoices(command) => invoices(&crm, &config, cli.json, command).await,
    Command::Payments(command) => payments(&crm, cli.json, command).await,
    Command::Dashboard => {
      let stats = crm.dashboard().await.context("loading dashboard")?;
      output::dashboard(&stats, cli.json)
    }
  }
}
