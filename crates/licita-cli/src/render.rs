//! Plain-text rendering for terminal output.

use std::fmt::Write;

use licita_common::{Principal, ProcessRecord, ProposalRecord};
use licita_proposal::{CommercialTotals, Schedule};
use licita_security::PageAccess;

pub fn principal(principal: &Principal) -> String {
    let mut out = format!(
        "{} <{}>\nrole: {} ({})",
        principal.greeting_name(),
        if principal.email.is_empty() { "-" } else { &principal.email },
        principal.role,
        principal.role.label()
    );
    let effective = principal.effective_role();
    if effective != principal.role {
        let _ = write!(out, "\neffective role: {}", effective);
    }
    out
}

pub fn page_access(path: &str, access: &PageAccess) -> String {
    match access {
        PageAccess::Authorized(ctx) => format!(
            "{}: authorized as {} ({})",
            path,
            ctx.principal().greeting_name(),
            ctx.effective_role()
        ),
        PageAccess::NoSession { redirect } => format!("{}: no session, redirect to {}", path, redirect),
        PageAccess::Expired { redirect, message } | PageAccess::RoleMismatch { redirect, message } => {
            format!("{}: {} redirect to {}", path, message, redirect)
        }
    }
}

pub fn schedule(schedule: &Schedule) -> String {
    let mut out = String::from("Atividade | Duração | Início | Fim\n");
    for row in &schedule.rows {
        let _ = writeln!(
            out,
            "{} | {} | {} | {}",
            row.description,
            row.duration.map(|d| d.to_string()).unwrap_or_default(),
            row.start_label(),
            row.end_label()
        );
    }
    match schedule.execution_deadline() {
        Some(deadline) => {
            let _ = write!(out, "Prazo de execução: {}", deadline);
        }
        None => out.push_str("Prazo de execução: -"),
    }
    out
}

pub fn totals(totals: &CommercialTotals) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Mão de obra: {}", totals.labor.to_currency());
    let _ = writeln!(out, "Materiais: {}", totals.materials.to_currency());
    let _ = writeln!(out, "Equipamentos: {}", totals.equipment.to_currency());
    if let Some(services) = totals.services {
        let _ = writeln!(out, "Serviços (informativo): {}", services.to_currency());
    }
    let _ = writeln!(out, "Custo direto: {}", totals.direct_cost.to_currency());
    let _ = writeln!(
        out,
        "BDI ({}%): {}",
        totals.overhead_percent.to_localized(),
        totals.overhead_amount.to_currency()
    );
    let _ = write!(out, "Valor total: {}", totals.grand_total.to_currency());
    out
}

pub fn processes(records: &[ProcessRecord]) -> String {
    if records.is_empty() {
        return "Nenhum processo encontrado".to_string();
    }
    records
        .iter()
        .map(|p| {
            format!(
                "{} | {} | {:?} | {}",
                p.number,
                p.title,
                p.status,
                p.deadline
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn proposals(records: &[ProposalRecord]) -> String {
    if records.is_empty() {
        return "Nenhuma proposta encontrada".to_string();
    }
    records
        .iter()
        .map(|p| {
            format!(
                "{} | {} | {} | {} | {}",
                p.protocol,
                p.process_id,
                p.company_name,
                p.company_tax_id,
                p.total.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
