use comfy_table::{Attribute, Cell, Table};
use crm_app_lib::dashboard::DashboardStats;
use crm_app_lib::format::{format_currency, format_date};
use crm_app_lib::model::{Customer, Estimate, Invoice, PaymentListing};
use crm_app_lib::payments::total_received;
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn opt(value: Option<&str>) -> &str {
  value.unwrap_or("")
}

pub fn customers(list: &[Customer], json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(list);
  }
  let mut table = Table::new();
  table.set_header(vec!["ID", "Name", "Email", "Phone", "Address"]);
  for c in list {
    table.add_row(vec![
      c.id.as_str(),
      c.name.as_str(),
      opt(c.email.as_deref()),
      opt(c.phone.as_deref()),
      opt(c.address.as_deref()),
    ]);
  }
  println!("{table}");
  Ok(())
}

fn estimate_table(list: &[Estimate]) -> Table {
  let mut table = Table::new();
  table.set_header(vec!["ID", "Number", "Customer", "Date", "Status", "Total"]);
  for e in list {
    table.add_row(vec![
      Cell::new(&e.id),
      Cell::new(&e.estimate_number),
      Cell::new(e.customer_name()),
      Cell::new(format_date(&e.estimate_date)),
      Cell::new(e.status),
      Cell::new(format_currency(e.total_amount)),
    ]);
  }
  table
}

pub fn estimates(list: &[Estimate], json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(list);
  }
  println!("{}", estimate_table(list));
  Ok(())
}

fn invoice_table(list: &[Invoice]) -> Table {
  let mut table = Table::new();
  table.set_header(vec!["ID", "Number", "Customer", "Date", "Status", "Total", "Paid", "Due"]);
  for i in list {
    table.add_row(vec![
      Cell::new(&i.id),
      Cell::new(&i.invoice_number),
      Cell::new(i.customer_name()),
      Cell::new(format_date(&i.invoice_date)),
      Cell::new(i.status),
      Cell::new(format_currency(i.total_amount)),
      Cell::new(format_currency(i.amount_paid)),
      Cell::new(format_currency(i.amount_due)),
    ]);
  }
  table
}

pub fn invoices(list: &[Invoice], json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(list);
  }
  println!("{}", invoice_table(list));
  Ok(())
}

pub fn payments(list: &[PaymentListing], json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(list);
  }
  let mut table = Table::new();
  table.set_header(vec!["ID", "Date", "Invoice", "Customer", "Method", "Reference", "Amount"]);
  for p in list {
    table.add_row(vec![
      Cell::new(&p.payment.id),
      Cell::new(format_date(&p.payment.payment_date)),
      Cell::new(p.invoice_number()),
      Cell::new(p.customer_name()),
      Cell::new(p.payment.payment_method),
      Cell::new(opt(p.payment.reference_number.as_deref())),
      Cell::new(format_currency(p.payment.amount)),
    ]);
  }
  table.add_row(vec![
    Cell::new("Total received").add_attribute(Attribute::Bold),
    Cell::new(""),
    Cell::new(""),
    Cell::new(""),
    Cell::new(""),
    Cell::new(""),
    Cell::new(format_currency(total_received(list))).add_attribute(Attribute::Bold),
  ]);
  println!("{table}");
  Ok(())
}

pub fn dashboard(stats: &DashboardStats, json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(stats);
  }
  let mut summary = Table::new();
  summary.set_header(vec!["Customers", "Estimates", "Invoices", "Revenue", "Paid", "Pending"]);
  summary.add_row(vec![
    Cell::new(stats.total_customers),
    Cell::new(stats.total_estimates),
    Cell::new(stats.total_invoices),
    Cell::new(format_currency(stats.total_revenue)),
    Cell::new(format_currency(stats.paid_amount)),
    Cell::new(format_currency(stats.pending_amount)),
  ]);
  println!("{summary}");
  println!("\nRecent estimates");
  println!("{}", estimate_table(&stats.recent_estimates));
  println!("\nRecent invoices");
  println!("{}", invoice_table(&stats.recent_invoices));
  Ok(())
}
