use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use client_core::ViewState;
use shared::domain::{PaymentRecord, WorkItem};

/// `DD MON YYYY HH:MM` in UTC, falling back to the raw seconds when the value
/// is outside chrono's range.
pub fn format_deadline(epoch_secs: u64) -> String {
    let Some(at) = i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    else {
        return epoch_secs.to_string();
    };
    format!(
        "{} {} {}",
        at.format("%d"),
        at.format("%b").to_string().to_uppercase(),
        at.format("%Y %H:%M")
    )
}

fn flag(value: bool) -> &'static str {
    if value {
        "Open"
    } else {
        "Closed"
    }
}

fn prefix(value: &str, len: usize) -> &str {
    value.get(..len).unwrap_or(value)
}

pub fn jobs_table(jobs: &[WorkItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<10} {:<32} {:<8} {:>14} {:<8} {:<9} {:<6} {:<8} {}",
        "ID", "CLIENT", "DESCRIPTION", "WORKER", "AMOUNT", "ACCEPTED", "COMPLETED", "PAID", "ASSIGNED", "DEADLINE"
    );
    for job in jobs {
        let freelancer = job
            .freelancer
            .as_ref()
            .map(|address| prefix(address.as_str(), 6))
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:<32} {:<8} {:>14} {:<8} {:<9} {:<6} {:<8} {}",
            job.job_id.to_string(),
            job.client.short(),
            job.description,
            freelancer,
            job.payment_amount.to_string(),
            flag(job.is_accepted),
            flag(job.is_completed),
            flag(job.is_paid),
            flag(job.is_freelancer_assigned()),
            format_deadline(job.deadline),
        );
    }
    out
}

pub fn payments_table(payments: &[PaymentRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<10} {:<10} {:>14} {:<8} {}",
        "ID", "PAYER", "PAYEE", "AMOUNT", "REFUNDED", "MESSAGE"
    );
    for payment in payments {
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:<10} {:>14} {:<8} {}",
            payment.payment_id.to_string(),
            payment.payer.short(),
            payment.payee.short(),
            payment.amount.to_string(),
            if payment.is_refunded { "yes" } else { "no" },
            payment.message,
        );
    }
    out
}

pub fn job_detail(job: &WorkItem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job {}", job.job_id);
    let _ = writeln!(out, "  Client:      {}", job.client);
    let _ = writeln!(
        out,
        "  Freelancer:  {}",
        job.freelancer
            .as_ref()
            .map(|address| address.as_str())
            .unwrap_or("-")
    );
    let _ = writeln!(out, "  Description: {}", job.description);
    let _ = writeln!(out, "  Payment:     {}", job.payment_amount);
    let _ = writeln!(out, "  Accepted:    {}", flag(job.is_accepted));
    let _ = writeln!(out, "  Completed:   {}", flag(job.is_completed));
    let _ = writeln!(out, "  Paid:        {}", flag(job.is_paid));
    let _ = writeln!(out, "  End Time:    {}", format_deadline(job.deadline));
    out
}

pub fn payment_detail(payment: &PaymentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Payment {}", payment.payment_id);
    let _ = writeln!(out, "  Payer:    {}", payment.payer);
    let _ = writeln!(out, "  Payee:    {}", payment.payee);
    let _ = writeln!(out, "  Amount:   {}", payment.amount);
    let _ = writeln!(out, "  Refunded: {}", payment.is_refunded);
    let _ = writeln!(out, "  Message:  {}", payment.message);
    out
}

/// Line printed under a table whose view could not be read.
pub fn degraded_notice(state: &ViewState) -> Option<String> {
    match state {
        ViewState::Errored { reason, .. } => Some(format!("(could not load: {reason})")),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
