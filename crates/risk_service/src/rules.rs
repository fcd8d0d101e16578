//! Rule-based explanations
//!
//! Templated prose built from the risk tier, the strongest attributions and
//! a handful of raw application fields. No I/O; always succeeds.

use credit_risk_core::{AttributionMap, LoanRecord, PredictionResult, RiskLevel};

/// Appended to every rule-based narrative
pub const FALLBACK_NOTE: &str = "*Note: This explanation was generated using rule-based analysis as AI-powered insights are temporarily unavailable.*";

/// Longest remediation text returned
pub const MAX_REMEDIATION_CHARS: usize = 400;

/// Raw application figures the rules look at
#[derive(Debug, Clone, Copy, Default)]
struct Applicant {
    income: Option<f64>,
    loan_amount: Option<f64>,
    percent_income: Option<f64>,
    interest_rate: Option<f64>,
    credit_history_years: Option<f64>,
    employment_years: Option<f64>,
    previous_default: bool,
}

impl Applicant {
    fn from_record(record: &LoanRecord) -> Self {
        let number = |field: &str| record.get(field).as_f64();
        let income = number("person_income");
        let loan_amount = number("loan_amnt");
        let percent_income = number("loan_percent_income").or(match (loan_amount, income) {
            (Some(amount), Some(income)) if income > 0.0 => Some(amount / income),
            _ => None,
        });

        let previous_default = ["cb_person_default_on_file", "default_on_file"]
            .iter()
            .filter_map(|field| record.get(field).as_category())
            .any(|flag| matches!(flag.to_ascii_uppercase().as_str(), "Y" | "YES" | "TRUE"));

        Self {
            income,
            loan_amount,
            percent_income,
            interest_rate: number("loan_int_rate"),
            credit_history_years: number("cb_person_cred_hist_length"),
            employment_years: number("person_emp_length"),
            previous_default,
        }
    }
}

/// Narrative for a scored application, ending with [`FALLBACK_NOTE`]
pub fn narrative(
    result: &PredictionResult,
    attributions: &AttributionMap,
    record: &LoanRecord,
) -> String {
    let applicant = Applicant::from_record(record);
    let mut text = match result.risk_level {
        RiskLevel::High => high_risk(&applicant, attributions),
        RiskLevel::Borderline => moderate_risk(&applicant, attributions),
        RiskLevel::Low => low_risk(&applicant, attributions),
    };
    text.push_str("\n\n");
    text.push_str(FALLBACK_NOTE);
    text
}

fn high_risk(applicant: &Applicant, attributions: &AttributionMap) -> String {
    let mut text = String::from(
        "This loan application has been flagged as **high risk** based on our credit risk assessment model. ",
    );

    let mut concerns = Vec::new();
    if let Some(pct) = applicant.percent_income.filter(|pct| *pct > 0.4) {
        concerns.push(format!(
            "the requested loan amount represents {}% of annual income, which is significantly high",
            percent(pct)
        ));
    }
    if let Some(rate) = applicant.interest_rate.filter(|rate| *rate >= 15.0) {
        concerns.push(format!(
            "the interest rate of {rate:.1}% indicates elevated risk"
        ));
    }
    if applicant.credit_history_years.is_some_and(|years| years < 2.0) {
        concerns.push("limited credit history (less than 2 years)".to_string());
    }
    if applicant.employment_years.is_some_and(|years| years < 1.0) {
        concerns.push("very short employment duration".to_string());
    }
    if applicant.previous_default {
        concerns.push("previous default on file".to_string());
    }
    if !concerns.is_empty() {
        text.push_str(&format!("Key concerns include: {}. ", concerns.join(", ")));
    }

    let factors: Vec<String> = attributions
        .top(3)
        .iter()
        .filter(|(_, value)| *value > 0.0)
        .map(|(name, _)| readable_factor(name))
        .collect();
    if !factors.is_empty() {
        text.push_str(&format!(
            "The most significant factors contributing to this decision are: {}. ",
            factors.join(", ")
        ));
    }

    text.push_str(
        "We recommend reviewing the application details and considering risk mitigation measures before approval.",
    );
    text
}

fn moderate_risk(applicant: &Applicant, attributions: &AttributionMap) -> String {
    let mut text =
        String::from("This loan application presents **moderate risk** according to our assessment. ");

    let mut positives = Vec::new();
    if applicant.income.is_some_and(|income| income >= 50_000.0) {
        positives.push("stable income level".to_string());
    }
    if applicant.credit_history_years.is_some_and(|years| years >= 5.0) {
        positives.push("established credit history".to_string());
    }
    if applicant.employment_years.is_some_and(|years| years >= 5.0) {
        positives.push("long-term employment".to_string());
    }

    let mut concerns = Vec::new();
    if let Some(pct) = applicant.percent_income.filter(|pct| *pct > 0.3) {
        concerns.push(format!("loan-to-income ratio of {}%", percent(pct)));
    }
    if applicant.interest_rate.is_some_and(|rate| rate >= 12.0) {
        concerns.push("elevated interest rate".to_string());
    }

    match (positives.is_empty(), concerns.is_empty()) {
        (false, false) => text.push_str(&format!(
            "While the applicant shows {}, there are concerns regarding {}. ",
            positives.join(" and "),
            concerns.join(" and ")
        )),
        (false, true) => text.push_str(&format!(
            "The applicant demonstrates {}, though some risk factors remain. ",
            positives.join(" and ")
        )),
        (true, false) => text.push_str(&format!(
            "Key concerns include {}. ",
            concerns.join(" and ")
        )),
        (true, true) => {}
    }
    push_weighed_factors(&mut text, attributions);

    text.push_str("Additional verification or adjusted loan terms may help mitigate the identified risks.");
    text
}

fn low_risk(applicant: &Applicant, attributions: &AttributionMap) -> String {
    let mut text = String::from(
        "This loan application has been assessed as **low risk** and is recommended for approval. ",
    );

    let mut strengths = Vec::new();
    if let Some(income) = applicant.income.filter(|income| *income >= 60_000.0) {
        strengths.push(format!("strong annual income of ${}", money(income)));
    }
    if let Some(pct) = applicant.percent_income.filter(|pct| *pct <= 0.25) {
        strengths.push(format!("conservative loan-to-income ratio of {}%", percent(pct)));
    }
    if let Some(years) = applicant.credit_history_years.filter(|years| *years >= 5.0) {
        strengths.push(format!("solid credit history of {years:.0} years"));
    }
    if let Some(years) = applicant.employment_years.filter(|years| *years >= 5.0) {
        strengths.push(format!("stable employment for {years:.0} years"));
    }
    if !applicant.previous_default {
        strengths.push("no previous defaults".to_string());
    }
    if !strengths.is_empty() {
        text.push_str(&format!(
            "Key positive factors include: {}. ",
            strengths.join(", ")
        ));
    }

    if let Some(amount) = applicant.loan_amount {
        text.push_str(&format!(
            "The requested loan amount of ${} appears manageable based on the applicant's financial profile. ",
            money(amount)
        ));
    }
    push_weighed_factors(&mut text, attributions);

    text.push_str("This application meets our standard approval criteria.");
    text
}

/// Concrete next steps for the lender, or `None` when nothing applies
pub fn remediation(attributions: &AttributionMap, record: &LoanRecord) -> Option<String> {
    let applicant = Applicant::from_record(record);
    let mut suggestions: Vec<String> = Vec::new();

    if applicant.previous_default {
        suggestions.push(
            "Applicant has a previous default on file; require a co-signer, collateral, or significantly reduce the requested amount."
                .to_string(),
        );
    }

    if let Some(pct) = applicant.percent_income.filter(|pct| *pct > 0.35) {
        match applicant.income.filter(|income| *income > 0.0) {
            Some(income) => suggestions.push(format!(
                "Requested loan equals {}% of income; consider reducing the loan to ~${} (≈30% of income) or offering a longer term.",
                percent(pct),
                money((income * 0.30).max(0.0).trunc())
            )),
            None => suggestions.push(
                "Requested loan is a large share of income; consider reducing the amount or verifying income documentation."
                    .to_string(),
            ),
        }
    }

    if let (Some(amount), Some(income)) = (applicant.loan_amount, applicant.income) {
        if amount > income * 0.5 {
            suggestions.push(format!(
                "Loan amount (${}) is >50% of annual income; consider reducing amount or requiring collateral/co-signer.",
                money(amount.trunc())
            ));
        }
    }

    if applicant.interest_rate.is_some_and(|rate| rate >= 15.0) {
        suggestions.push(
            "Loan interest rate is high; consider offering a lower rate, longer term, or requiring additional assurances (collateral/co-signer)."
                .to_string(),
        );
    }

    if applicant.credit_history_years.is_some_and(|years| years < 2.0) {
        suggestions.push(
            "Short credit history; consider requiring a guarantor or additional documentation, or offer a smaller secured loan."
                .to_string(),
        );
    }

    if applicant.employment_years.is_some_and(|years| years < 6.0) {
        suggestions.push(
            "Limited recent employment duration; consider verifying employment stability or requiring a co-signer."
                .to_string(),
        );
    }

    if suggestions.is_empty() {
        if let Some((top, _)) = attributions.top(1).first() {
            suggestions.push(top_factor_suggestion(top).to_string());
        }
    }

    if suggestions.is_empty() {
        return None;
    }
    Some(truncate_at_sentence(&suggestions.join(" "), MAX_REMEDIATION_CHARS))
}

/// Strongest attributions in either direction, e.g. `int rate (raises risk)`
fn push_weighed_factors(text: &mut String, attributions: &AttributionMap) {
    let factors: Vec<String> = attributions
        .top(3)
        .iter()
        .filter(|(_, value)| *value != 0.0)
        .map(|(name, value)| {
            let direction = if *value > 0.0 { "raises risk" } else { "lowers risk" };
            format!("{} ({direction})", readable_factor(name))
        })
        .collect();
    if !factors.is_empty() {
        text.push_str(&format!(
            "The factors weighing most in this assessment are: {}. ",
            factors.join(", ")
        ));
    }
}

fn top_factor_suggestion(field: &str) -> &'static str {
    if field.contains("loan_amnt") || field.contains("loan_percent_income") {
        "Top risk factor is loan size; reduce requested amount or increase downpayment."
    } else if field.contains("person_income") {
        "Top risk factor is low income; require income verification or lower the loan amount."
    } else if field.contains("loan_int_rate") {
        "Top risk factor is interest rate; consider presenting refinancing or longer term options."
    } else {
        "Top contributing factors indicate elevated risk; consider reducing exposure (smaller loan), requiring collateral/co-signer, or additional underwriting checks."
    }
}

/// `person_emp_length` reads as `emp length`
fn readable_factor(field: &str) -> String {
    field
        .replace('_', " ")
        .replace("person ", "")
        .replace("loan ", "")
        .replace("cb ", "")
}

/// Cut to at most `max_chars`, ending on the last full sentence
fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let body = head.rfind('.').map_or(head, |dot| &head[..dot]);
    format!("{body}.")
}

fn percent(ratio: f64) -> String {
    format!("{:.0}", ratio * 100.0)
}

/// Whole dollars with thousands separators
fn money(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if amount < 0.0 && rounded != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}
