//! Commercial totals: category sums, direct cost, overhead (BDI) and grand total.

use serde::{Deserialize, Serialize};

use crate::money::{Money, Percentage, Quantity};

/// One priced row of a cost table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    #[serde(rename = "descricao", alias = "description", default)]
    pub description: String,
    #[serde(rename = "unidade", alias = "unit", default)]
    pub unit: String,
    #[serde(rename = "quantidade", alias = "quantity", default)]
    pub quantity: String,
    /// Localized price text, e.g. `1.234,56`
    #[serde(rename = "valorUnitario", alias = "unit_price", default)]
    pub unit_price: String,
}

impl CostLine {
    pub fn new(
        description: impl Into<String>,
        unit: impl Into<String>,
        quantity: impl Into<String>,
        unit_price: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            unit: unit.into(),
            quantity: quantity.into(),
            unit_price: unit_price.into(),
        }
    }

    pub fn line_total(&self) -> Money {
        Money::parse_or_zero(&self.unit_price).times(&Quantity::parse_or_zero(&self.quantity))
    }
}

/// A cost table. When it has no rows, the typed-in total is used instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCategory {
    #[serde(rename = "itens", alias = "lines", default)]
    pub lines: Vec<CostLine>,
    #[serde(rename = "total", default, skip_serializing_if = "Option::is_none")]
    pub manual_total: Option<String>,
}

impl CostCategory {
    pub fn from_lines(lines: Vec<CostLine>) -> Self {
        Self {
            lines,
            manual_total: None,
        }
    }

    pub fn from_total(total: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            manual_total: Some(total.into()),
        }
    }

    pub fn total(&self) -> Money {
        if self.lines.is_empty() {
            self.manual_total
                .as_deref()
                .map(Money::parse_or_zero)
                .unwrap_or_default()
        } else {
            self.lines.iter().map(CostLine::line_total).sum()
        }
    }
}

/// Commercial tab of the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialInput {
    #[serde(rename = "maoObra", alias = "labor", default)]
    pub labor: CostCategory,
    #[serde(rename = "materiais", alias = "materials", default)]
    pub materials: CostCategory,
    #[serde(rename = "equipamentos", alias = "equipment", default)]
    pub equipment: CostCategory,
    /// Carried along but never part of the direct cost
    #[serde(rename = "totalServicos", alias = "services_total", default, skip_serializing_if = "Option::is_none")]
    pub services_total: Option<String>,
    #[serde(rename = "bdiPercentual", alias = "overhead_percent", default)]
    pub overhead_percent: String,
    #[serde(rename = "validadeProposta", alias = "validity", default)]
    pub validity: String,
}

/// Derived amounts, recomputed on every edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommercialTotals {
    pub labor: Money,
    pub materials: Money,
    pub equipment: Money,
    pub services: Option<Money>,
    pub direct_cost: Money,
    pub overhead_percent: Percentage,
    pub overhead_amount: Money,
    pub grand_total: Money,
}

/// direct = labor + materials + equipment; overhead = direct × pct / 100;
/// grand total = direct + overhead.
pub fn compute_totals(input: &CommercialInput) -> CommercialTotals {
    let labor = input.labor.total();
    let materials = input.materials.total();
    let equipment = input.equipment.total();
    let direct_cost = labor + materials + equipment;

    let overhead_percent = Percentage::parse_or_zero(&input.overhead_percent);
    let overhead_amount = direct_cost.percent(overhead_percent);

    CommercialTotals {
        labor,
        materials,
        equipment,
        services: input.services_total.as_deref().and_then(Money::parse),
        direct_cost,
        overhead_percent,
        overhead_amount,
        grand_total: direct_cost + overhead_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_input() -> CommercialInput {
        CommercialInput {
            labor: CostCategory::from_lines(vec![CostLine::new("Pedreiro", "h", "100", "10,00")]),
            materials: CostCategory::from_lines(vec![
                CostLine::new("Cimento", "sc", "10", "30,00"),
                CostLine::new("Areia", "m3", "2", "100,00"),
            ]),
            equipment: CostCategory::from_total("250,00"),
            services_total: Some("9.999,99".to_string()),
            overhead_percent: "20".to_string(),
            validity: "60 dias".to_string(),
        }
    }

    #[test]
    fn test_reference_totals() {
        let totals = compute_totals(&reference_input());
        assert_eq!(totals.labor, Money::from_units(1000));
        assert_eq!(totals.materials, Money::from_units(500));
        assert_eq!(totals.equipment, Money::from_units(250));
        assert_eq!(totals.direct_cost.to_localized(), "1.750,00");
        assert_eq!(totals.overhead_amount.to_localized(), "350,00");
        assert_eq!(totals.grand_total.to_localized(), "2.100,00");
    }

    #[test]
    fn test_services_total_excluded_from_direct_cost() {
        let totals = compute_totals(&reference_input());
        assert_eq!(totals.services, Some(Money::from_cents(999_999)));
        assert_eq!(totals.direct_cost, Money::from_units(1750));
    }

    #[test]
    fn test_empty_form_is_all_zero() {
        let totals = compute_totals(&CommercialInput::default());
        assert_eq!(totals.grand_total, Money::ZERO);
        assert_eq!(totals.services, None);
    }

    #[test]
    fn test_line_total_with_fractional_quantity() {
        let line = CostLine::new("Betoneira", "dia", "1,5", "R$ 1.200,00");
        assert_eq!(line.line_total(), Money::from_units(1800));
        assert_eq!(CostLine::new("x", "", "", "10").line_total(), Money::ZERO);
    }

    #[test]
    fn test_rows_take_precedence_over_manual_total() {
        let category = CostCategory {
            lines: vec![CostLine::new("a", "", "1", "5,00")],
            manual_total: Some("1.000,00".to_string()),
        };
        assert_eq!(category.total(), Money::from_units(5));
    }
}
