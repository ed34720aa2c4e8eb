//! Fallback content for leads without a scrapeable website.
//!
//! Registry lookups (CNPJ data) often know more about a company than its
//! missing or broken website. This renders those fields as plain text so the
//! briefing stage has something to work from.

use std::fmt::Write as _;

use crate::domain::Lead;

/// Plain-text company profile from the lead's structured fields, or `None`
/// when nothing beyond the company name is known.
pub fn synthesize_profile(lead: &Lead) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(extra) = &lead.extra_data {
        push_field(&mut lines, "Legal name", extra.legal_name.as_deref());
        push_field(&mut lines, "Trade name", extra.trade_name.as_deref());
        push_field(&mut lines, "CNPJ", extra.cnpj.as_deref());
        push_field(&mut lines, "Main activity", extra.main_activity.as_deref());
        if !extra.secondary_activities.is_empty() {
            lines.push(format!(
                "Secondary activities: {}",
                extra.secondary_activities.join("; ")
            ));
        }
        push_field(&mut lines, "Founded", extra.founded_on.as_deref());
        if let Some(capital) = extra.share_capital.filter(|c| *c > 0.0) {
            lines.push(format!("Share capital: R$ {capital:.2}"));
        }
        push_field(&mut lines, "Company size", extra.company_size.as_deref());
        push_field(
            &mut lines,
            "Registration status",
            extra.registration_status.as_deref(),
        );
        if !extra.partners.is_empty() {
            let partners: Vec<String> = extra
                .partners
                .iter()
                .map(|p| match &p.role {
                    Some(role) => format!("{} ({role})", p.name),
                    None => p.name.clone(),
                })
                .collect();
            lines.push(format!("Partners: {}", partners.join(", ")));
        }
    }

    push_field(&mut lines, "Category", lead.category.as_deref());
    push_field(&mut lines, "Address", lead.address.as_deref());
    let location = [lead.city.as_deref(), lead.state.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" - ");
    if !location.is_empty() {
        lines.push(format!("Location: {location}"));
    }

    if lines.is_empty() {
        return None;
    }

    let mut out = String::new();
    let _ = writeln!(out, "Company: {}", lead.company_name);
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    Some(out)
}

fn push_field(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        lines.push(format!("{label}: {value}"));
    }
}
