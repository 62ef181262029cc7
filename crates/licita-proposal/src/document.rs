//! Proposal form state and the document assembled from it at submit time.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use licita_common::normalize_tax_id;

use crate::commercial::{compute_totals, CommercialInput, CommercialTotals, CostLine};
use crate::schedule::{compute_schedule, ActivityInput, Schedule};

// ============================================================================
// Form
// ============================================================================

/// Company identification tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(rename = "razaoSocial", alias = "legal_name", default)]
    pub legal_name: String,
    #[serde(rename = "cnpj", alias = "tax_id", default)]
    pub tax_id: String,
    #[serde(rename = "endereco", alias = "address", default)]
    pub address: String,
    #[serde(rename = "cidade", alias = "city", default)]
    pub city: String,
    #[serde(rename = "telefone", alias = "phone", default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "respTecnico", alias = "technical_lead", default)]
    pub technical_lead: String,
    /// Engineering council registration of the technical lead
    #[serde(default)]
    pub crea: String,
}

/// Narrative fields of the technical tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalInput {
    #[serde(rename = "objetoConcorrencia", default)]
    pub object: String,
    #[serde(rename = "escopoInclusos", default)]
    pub scope_included: String,
    #[serde(rename = "escopoExclusos", default)]
    pub scope_excluded: String,
    #[serde(rename = "metodologia", default)]
    pub methodology: String,
    #[serde(rename = "sequenciaExecucao", default)]
    pub execution_sequence: String,
    #[serde(rename = "prazoMobilizacao", default)]
    pub mobilization_period: String,
    #[serde(rename = "garantias", default)]
    pub warranties: String,
    #[serde(rename = "estruturaCanteiro", default)]
    pub site_structure: String,
    #[serde(rename = "obrigacoesContratada", default)]
    pub contractor_obligations: String,
    #[serde(rename = "obrigacoesContratante", default)]
    pub client_obligations: String,
    #[serde(rename = "condicoesPremissas", default)]
    pub assumptions: String,
    #[serde(rename = "experienciaEmpresa", default)]
    pub company_experience: String,
    #[serde(rename = "atestadosObras", default)]
    pub certificates: String,
    #[serde(rename = "observacoesFinais", default)]
    pub final_notes: String,
}

/// File declared for upload with the proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "nome", alias = "file_name")]
    pub file_name: String,
    #[serde(rename = "tamanho", alias = "size_bytes", default)]
    pub size_bytes: u64,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes,
        }
    }
}

/// Everything the supplier has typed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalForm {
    #[serde(rename = "processo", alias = "process", default)]
    pub process: String,
    #[serde(rename = "dados", alias = "company", default)]
    pub company: CompanyInfo,
    #[serde(rename = "tecnica", alias = "technical", default)]
    pub technical: TechnicalInput,
    #[serde(rename = "cronograma", alias = "schedule", default)]
    pub schedule: Vec<ActivityInput>,
    #[serde(rename = "comercial", alias = "commercial", default)]
    pub commercial: CommercialInput,
    /// Overwritten by the schedule total whenever that total is positive
    #[serde(rename = "prazoExecucao", alias = "execution_deadline", default)]
    pub execution_deadline: String,
    #[serde(rename = "formaPagamento", alias = "payment_terms", default)]
    pub payment_terms: String,
    #[serde(rename = "anexos", alias = "attachments", default)]
    pub attachments: Vec<Attachment>,
}

impl ProposalForm {
    pub fn for_process(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            ..Self::default()
        }
    }

    pub fn tax_id(&self) -> String {
        normalize_tax_id(&self.company.tax_id)
    }

    pub fn compute_schedule(&self) -> Schedule {
        compute_schedule(&self.schedule)
    }

    pub fn compute_totals(&self) -> CommercialTotals {
        compute_totals(&self.commercial)
    }

    /// Blank form for a new proposal on the same process
    pub fn reset(&self) -> Self {
        Self::for_process(self.process.clone())
    }

    pub fn assemble<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> ProposalDocument {
        self.assemble_with_protocol(generate_protocol(now, rng), now)
    }

    /// Builds the nested document with derived schedule and totals
    pub fn assemble_with_protocol(&self, protocol: String, now: DateTime<Utc>) -> ProposalDocument {
        let schedule = self.compute_schedule();
        let execution_deadline = schedule.apply_deadline(&self.execution_deadline);
        let totals = self.compute_totals();

        let rows = self
            .schedule
            .iter()
            .zip(&schedule.rows)
            .filter(|(input, _)| !input.description.trim().is_empty())
            .map(|(input, row)| ScheduleRow {
                activity: row.description.clone(),
                duration: input.duration.trim().to_string(),
                start: row.start_label(),
                end: row.end_label(),
            })
            .collect();

        ProposalDocument {
            protocol,
            process: self.process.trim().to_string(),
            company: self.company.clone(),
            technical: TechnicalSection {
                narrative: self.technical.clone(),
                schedule: rows,
                execution_deadline: execution_deadline.clone(),
            },
            commercial: CommercialSection::new(&self.commercial, &totals),
            summary: Summary {
                execution_deadline,
                payment_terms: self.payment_terms.clone(),
                grand_total: totals.grand_total.to_currency(),
            },
            attachments: self.attachments.clone(),
            generated_at: now,
        }
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    #[serde(rename = "atividade", alias = "activity")]
    pub activity: String,
    #[serde(rename = "duracao", alias = "duration")]
    pub duration: String,
    #[serde(rename = "inicio", alias = "start")]
    pub start: String,
    #[serde(rename = "fim", alias = "end")]
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalSection {
    #[serde(flatten)]
    pub narrative: TechnicalInput,
    #[serde(rename = "cronograma", default)]
    pub schedule: Vec<ScheduleRow>,
    #[serde(rename = "prazoExecucao", default)]
    pub execution_deadline: String,
}

/// Cost tables with every derived amount rendered as `1.750,00`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialSection {
    #[serde(rename = "maoObra", default)]
    pub labor: Vec<CostLine>,
    #[serde(rename = "materiais", default)]
    pub materials: Vec<CostLine>,
    #[serde(rename = "equipamentos", default)]
    pub equipment: Vec<CostLine>,
    #[serde(rename = "totalServicos", default, skip_serializing_if = "Option::is_none")]
    pub services_total: Option<String>,
    #[serde(rename = "totalMaoObra")]
    pub labor_total: String,
    #[serde(rename = "totalMateriais")]
    pub materials_total: String,
    #[serde(rename = "totalEquipamentos")]
    pub equipment_total: String,
    #[serde(rename = "custoDireto")]
    pub direct_cost: String,
    #[serde(rename = "bdiPercentual")]
    pub overhead_percent: String,
    #[serde(rename = "bdiValor")]
    pub overhead_amount: String,
    #[serde(rename = "valorTotal")]
    pub grand_total: String,
    #[serde(rename = "validadeProposta", default)]
    pub validity: String,
}

impl CommercialSection {
    fn new(input: &CommercialInput, totals: &CommercialTotals) -> Self {
        Self {
            labor: input.labor.lines.clone(),
            materials: input.materials.lines.clone(),
            equipment: input.equipment.lines.clone(),
            services_total: totals.services.map(|m| m.to_localized()),
            labor_total: totals.labor.to_localized(),
            materials_total: totals.materials.to_localized(),
            equipment_total: totals.equipment.to_localized(),
            direct_cost: totals.direct_cost.to_localized(),
            overhead_percent: totals.overhead_percent.to_localized(),
            overhead_amount: totals.overhead_amount.to_localized(),
            grand_total: totals.grand_total.to_localized(),
            validity: input.validity.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "prazoExecucao", alias = "execution_deadline", default)]
    pub execution_deadline: String,
    #[serde(rename = "formaPagamento", alias = "payment_terms", default)]
    pub payment_terms: String,
    #[serde(rename = "valorTotal", alias = "grand_total", default)]
    pub grand_total: String,
}

/// The nested document posted to the submission endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    #[serde(rename = "protocolo", alias = "protocol")]
    pub protocol: String,
    #[serde(rename = "processo", alias = "process")]
    pub process: String,
    #[serde(rename = "dados", alias = "company")]
    pub company: CompanyInfo,
    #[serde(rename = "tecnica", alias = "technical")]
    pub technical: TechnicalSection,
    #[serde(rename = "comercial", alias = "commercial")]
    pub commercial: CommercialSection,
    #[serde(rename = "resumo", alias = "summary")]
    pub summary: Summary,
    #[serde(rename = "documentos", alias = "attachments", default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "geradoEm", alias = "generated_at")]
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Protocol
// ============================================================================

/// `PROP-<YYYYMMDD>-<HHMM>-<NNN>`
pub fn format_protocol<Tz>(at: &DateTime<Tz>, suffix: u16) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("PROP-{}-{:03}", at.format("%Y%m%d-%H%M"), suffix % 1000)
}

/// Protocol stamped with the local wall-clock time and a random suffix
pub fn generate_protocol<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    format_protocol(&now.with_timezone(&Local), rng.gen_range(0..1000))
}

/// Shape check for protocols produced by [`generate_protocol`]
pub fn is_protocol(text: &str) -> bool {
    let Some(rest) = text.strip_prefix("PROP-") else {
        return false;
    };
    let parts: Vec<&str> = rest.split('-').collect();
    matches!(parts.as_slice(), [date, time, suffix]
        if date.len() == 8 && time.len() == 4 && suffix.len() == 3
            && [date, time, suffix].iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())))
}
