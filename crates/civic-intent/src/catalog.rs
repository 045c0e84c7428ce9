//! Canned responses per department.
//!
//! Each department has a base response and a short ordered list of
//! sub-intent variants. Variants are checked only after the department is
//! fixed; the first one that matches replaces the base text (and actions,
//! when it carries its own). Shared variants apply to any department whose
//! own list did not match.

use std::collections::HashMap;

use civic_core::{
    ActionButton, ColorHint, ContactBlock, DepartmentContext, IconKey, RelatedTopic,
    StructuredResponse,
};

use crate::patterns::Matcher;

/// Text of the generic fallback response.
pub const FALLBACK_TEXT: &str = "I can help you locate that service. Select a department below or ask about taxes, vehicles, benefits, housing, or waste collection.";

/// A finer-grained answer inside one department.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: &'static str,
    matcher: Matcher,
    text: &'static str,
    actions: Option<Vec<ActionButton>>,
}

impl Variant {
    fn new(name: &'static str, matcher: Matcher, text: &'static str) -> Self {
        Self {
            name,
            matcher,
            text,
            actions: None,
        }
    }

    fn with_actions(mut self, actions: Vec<ActionButton>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.matcher.matches(normalized)
    }

    fn apply(&self, mut base: StructuredResponse) -> StructuredResponse {
        base.text = self.text.to_string();
        if let Some(actions) = &self.actions {
            base.actions = actions.clone();
        }
        base
    }
}

/// Base response plus its sub-intent cascade.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub base: StructuredResponse,
    pub variants: Vec<Variant>,
}

/// All canned responses.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<DepartmentContext, CatalogEntry>,
    shared: Vec<Variant>,
    fallback: StructuredResponse,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let entries = HashMap::from([
            (DepartmentContext::Tax, tax_entry()),
            (DepartmentContext::Vehicle, vehicle_entry()),
            (DepartmentContext::Benefits, benefits_entry()),
            (DepartmentContext::Housing, housing_entry()),
            (DepartmentContext::Waste, waste_entry()),
        ]);
        let shared = vec![
            Variant::new(
                "payment",
                Matcher::any(&["pay"]),
                "Proceed to the secure payment gateway below.",
            ),
            Variant::new(
                "application",
                Matcher::any(&["apply"]),
                "Start your application using the links below.",
            ),
        ];
        Self {
            entries,
            shared,
            fallback: fallback_response(),
        }
    }

    /// Base response of a department, `None` for the generic home context.
    pub fn base(&self, dept: DepartmentContext) -> Option<&StructuredResponse> {
        self.entries.get(&dept).map(|e| &e.base)
    }

    pub fn entry(&self, dept: DepartmentContext) -> Option<&CatalogEntry> {
        self.entries.get(&dept)
    }

    /// Resolve the answer for a fixed department and normalized text.
    pub fn answer(&self, dept: DepartmentContext, normalized: &str) -> Option<StructuredResponse> {
        let entry = self.entries.get(&dept)?;
        let variant = entry
            .variants
            .iter()
            .chain(self.shared.iter())
            .find(|v| v.matches(normalized));
        match variant {
            Some(v) => {
                tracing::debug!(department = %dept, variant = v.name, "Sub-intent matched");
                Some(v.apply(entry.base.clone()))
            }
            None => Some(entry.base.clone()),
        }
    }

    pub fn fallback(&self) -> &StructuredResponse {
        &self.fallback
    }
}

fn action(label: &str, icon: IconKey, color: ColorHint, url: &str) -> ActionButton {
    ActionButton::new(label, icon, color, url)
}

fn topic(label: &str, url: &str) -> RelatedTopic {
    RelatedTopic::new(label, url)
}

fn contact(phone: &str, email: Option<&str>, website: Option<&str>, hours: Option<&str>) -> ContactBlock {
    ContactBlock {
        phone: Some(phone.to_string()),
        email: email.map(str::to_string),
        website: website.map(str::to_string),
        hours: hours.map(str::to_string),
    }
}

fn tax_entry() -> CatalogEntry {
    let base = StructuredResponse::text(
        "You can file your local taxes or check your refund status using our secure digital portals.",
    )
    .with_actions(vec![
        action("E-File Returns", IconKey::FileCheck, ColorHint::Primary, "https://www.irs.gov/filing"),
        action("Pay Now", IconKey::DollarSign, ColorHint::Positive, "https://www.irs.gov/payments"),
        action("Check Refund Status", IconKey::CheckCircle, ColorHint::Neutral, "https://www.irs.gov/refunds"),
    ])
    .with_topics(vec![
        topic("Download Exemption Forms", "https://www.irs.gov/forms-instructions"),
        topic("Payment Plan Options", "https://www.irs.gov/payments/payment-plans-installment-agreements"),
        topic("Tax Calendar", "https://www.irs.gov/businesses/small-businesses-self-employed/online-tax-calendar"),
    ])
    .with_contact(contact(
        "555-TAX-HELP",
        Some("tax@localsphere.org"),
        Some("taxes.localsphere.org"),
        Some("Mon-Fri, 9am - 5pm"),
    ));

    let variants = vec![
        Variant::new(
            "tax_filing",
            Matcher::all(vec![
                Matcher::any(&["tax"]),
                Matcher::any(&["file", "return", "how to"]),
            ]),
            "To file your local taxes, start by gathering your income statements ([W-2s](https://www.irs.gov/forms-pubs/about-form-w-2), [1099s](https://www.irs.gov/forms-pubs/about-form-1099)) and previous year's return. Calculate your [local deduction](https://www.irs.gov/credits-deductions), then choose a digital filing option below for immediate processing.",
        ),
        Variant::new(
            "tax_refund",
            Matcher::any(&["refund"]),
            "Refunds are usually issued within six weeks of an accepted return. Use [Check Refund Status](https://www.irs.gov/refunds) with your filing ID to see where yours is.",
        ),
    ];
    CatalogEntry { base, variants }
}

fn vehicle_entry() -> CatalogEntry {
    let base = StructuredResponse::text(
        "Vehicle registrations must be renewed annually. Ensure your insurance is valid and your emission test is on file before proceeding with the digital renewal portal below.",
    )
    .with_actions(vec![
        action("Renew Registration", IconKey::Car, ColorHint::Primary, "https://www.usa.gov/car-registration"),
        action("Pay Citation", IconKey::FileCheck, ColorHint::Positive, "https://www.usa.gov/parking-tickets"),
        action("Check Registration Status", IconKey::CheckCircle, ColorHint::Neutral, "https://www.usa.gov/motor-vehicle-services"),
    ])
    .with_topics(vec![
        topic("Permit Zone Lookup", "https://www.transportation.gov/"),
        topic("Lost Title Process", "https://www.usa.gov/replace-car-title"),
        topic("Plate Replacement", "https://www.dmv.org/license-plates.php"),
    ])
    .with_contact(contact(
        "555-MV-REG",
        Some("parking@localsphere.org"),
        None,
        Some("Mon-Fri, 8am - 4pm"),
    ));

    let variants = vec![
        Variant::new(
            "vehicle_renewal",
            Matcher::any(&["renew", "registration", "vehicle"]),
            "Renewing takes minutes. Ensure your insurance is active and you have your [Renewal ID Number (RIN)](https://www.usa.gov/car-registration). Select a service to complete the transaction.",
        ),
        Variant::new(
            "vehicle_citation",
            Matcher::any(&["pay", "ticket", "citation", "fine"]),
            "Parking and transit citations can be paid online with your citation number. If you believe a ticket was issued in error you can [contest it](https://www.usa.gov/parking-tickets) within 21 days.",
        ),
    ];
    CatalogEntry { base, variants }
}

fn benefits_entry() -> CatalogEntry {
    let base = StructuredResponse::text(
        "Unemployment and community aid programs support residents through job transitions. Use the links below to check your eligibility or manage an existing claim.",
    )
    .with_actions(vec![
        action("File a Claim", IconKey::FileText, ColorHint::Primary, "https://www.benefits.gov/benefit-finder"),
        action("Cash Assistance", IconKey::DollarSign, ColorHint::Positive, "https://www.benefits.gov/categories/Financial%20Assistance%20and%20Support%20Services"),
        action("Food Pantry", IconKey::MapPin, ColorHint::Neutral, "https://www.fns.usda.gov/"),
    ])
    .with_topics(vec![
        topic("Job Training Programs", "https://www.careeronestop.org/"),
        topic("Child Care Subsidy", "https://www.childcare.gov/consumer-education/financial-assistance-for-families"),
        topic("Payment Schedule", "https://www.ssa.gov/pubs/calendar.htm"),
    ])
    .with_contact(contact(
        "555-AID-SOS",
        Some("support@localsphere.org"),
        None,
        Some("24/7 Hotline"),
    ));

    let variants = vec![
        Variant::new(
            "child_care",
            Matcher::any(&["child", "care"]),
            "For **Child Care Assistance**, you must meet income eligibility requirements. You can [apply for a subsidy](https://www.childcare.gov/consumer-education/financial-assistance-for-families) online or find a [licensed provider](https://www.childcare.gov/find-care) using the tools below.",
        )
        .with_actions(vec![
            action("Apply for Subsidy", IconKey::Users, ColorHint::Primary, "https://www.childcare.gov/consumer-education/financial-assistance-for-families"),
            action("Find Provider", IconKey::MapPin, ColorHint::Positive, "https://www.childcare.gov/find-care"),
        ]),
        Variant::new(
            "benefit_claim",
            Matcher::any(&["apply", "claim"]),
            "The application requires your [SSN](https://www.ssa.gov/number-card) and employment history. Once you create a [secure account](https://www.benefits.gov/), you can submit your initial claim using the links below.",
        ),
    ];
    CatalogEntry { base, variants }
}

fn housing_entry() -> CatalogEntry {
    let base = StructuredResponse::text(
        "To apply for housing assistance, start by verifying your eligibility based on [regional income limits](https://www.huduser.gov/portal/datasets/il.html). Once confirmed, you can submit an initial application to the Section 8 waitlist or view current affordable listings.",
    )
    .with_actions(vec![
        action("Apply Now", IconKey::Home, ColorHint::Primary, "https://www.hud.gov/program_offices/public_indian_housing/programs/hcv/about"),
        action("Rental Assistance", IconKey::DollarSign, ColorHint::Positive, "https://www.hud.gov/topics/rental_assistance"),
        action("View Map", IconKey::MapPin, ColorHint::Neutral, "https://www.huduser.gov/portal/maps/hcv/home.html"),
    ])
    .with_topics(vec![
        topic("Income Limit Chart", "https://www.huduser.gov/portal/datasets/il.html"),
        topic("Required Documentation", "https://www.usa.gov/housing-help-audiences"),
        topic("Emergency Housing", "https://www.hud.gov/findshelter"),
    ])
    .with_contact(contact(
        "555-HOME-SOS",
        Some("housing@localsphere.org"),
        None,
        Some("9AM-4PM M-F"),
    ));

    let variants = vec![Variant::new(
        "housing_programs",
        Matcher::any(&["section 8", "housing"]),
        "We offer several programs. You can [apply for Section 8 vouchers](https://www.hud.gov/program_offices/public_indian_housing/programs/hcv/about) or [view affordable housing listings](https://www.huduser.gov/portal/maps/hcv/home.html) directly online.",
    )];
    CatalogEntry { base, variants }
}

fn waste_entry() -> CatalogEntry {
    let base = StructuredResponse::text(
        "Waste collection occurs weekly based on your municipal zone. Recycling is collected bi-weekly. Enter your address in the zone locator below to view your specific pickup calendar.",
    )
    .with_actions(vec![action(
        "Find My Zone",
        IconKey::MapPin,
        ColorHint::Primary,
        "https://www.recyclesmartma.org/",
    )])
    .with_topics(vec![
        topic("Bulk Pickup Request", "https://www.wm.com/us/en/home/bulk-trash-pickup"),
        topic("Holiday Changes", "https://www.wm.com/us/en/holiday-schedule"),
        topic("Hazardous Waste", "https://www.epa.gov/hw"),
    ])
    .with_contact(contact("555-DUMP-IT", None, Some("waste.localsphere.org"), None));

    let variants = vec![Variant::new(
        "bulk_pickup",
        Matcher::any(&["bulk", "furniture", "appliance"]),
        "Bulk items such as furniture and appliances are collected by appointment. [Request a bulk pickup](https://www.wm.com/us/en/home/bulk-trash-pickup) at least three days before your regular collection day.",
    )];
    CatalogEntry { base, variants }
}

fn fallback_response() -> StructuredResponse {
    StructuredResponse::text(FALLBACK_TEXT)
        .with_actions(vec![action(
            "Department Directory",
            IconKey::Grid,
            ColorHint::Primary,
            "https://www.usa.gov/federal-agencies",
        )])
        .with_topics(vec![
            topic("Tax Office", "https://www.irs.gov"),
            topic("Transit Services", "https://www.transportation.gov"),
            topic("Social Aid", "https://www.benefits.gov"),
            topic("Housing Help", "https://www.hud.gov"),
            topic("Waste Collection", "https://www.epa.gov/recycle"),
        ])
        .with_contact(contact("311", Some("help@localsphere.org"), None, Some("24/7")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_has_no_entry() {
        let catalog = Catalog::new();
        assert!(catalog.base(DepartmentContext::Home).is_none());
        assert!(catalog.answer(DepartmentContext::Home, "anything").is_none());
    }

    #[test]
    fn test_every_department_entry_is_complete() {
        let catalog = Catalog::new();
        for dept in DepartmentContext::ALL.into_iter().filter(|d| !d.is_home()) {
            let entry = catalog.entry(dept).unwrap();
            assert!(!entry.base.text.is_empty(), "{} base text", dept);
            assert!(!entry.base.actions.is_empty(), "{} actions", dept);
            assert!(!entry.base.related_topics.is_empty(), "{} topics", dept);
            assert!(entry.base.contact_block.is_some(), "{} contact", dept);
            for variant in &entry.variants {
                assert!(!variant.text.is_empty());
            }
        }
    }

    #[test]
    fn test_tax_filing_variant() {
        let catalog = Catalog::new();
        let resp = catalog
            .answer(DepartmentContext::Tax, "how do i file my taxes?")
            .unwrap();
        assert!(resp.text.starts_with("To file your local taxes"));
        assert!(resp.text.contains("[W-2s](https://www.irs.gov/forms-pubs/about-form-w-2)"));
        // Variant keeps the base actions.
        assert_eq!(resp.actions, catalog.base(DepartmentContext::Tax).unwrap().actions);
    }

    #[test]
    fn test_tax_base_when_no_variant() {
        let catalog = Catalog::new();
        let resp = catalog.answer(DepartmentContext::Tax, "tax rates").unwrap();
        assert_eq!(&resp, catalog.base(DepartmentContext::Tax).unwrap());
    }

    #[test]
    fn test_child_care_variant_replaces_actions() {
        let catalog = Catalog::new();
        let resp = catalog
            .answer(DepartmentContext::Benefits, "child care subsidy")
            .unwrap();
        assert!(resp.text.contains("Child Care Assistance"));
        assert_eq!(resp.actions.len(), 2);
        assert_eq!(resp.actions[0].label, "Apply for Subsidy");
        assert_eq!(resp.actions[0].icon_key, IconKey::Users);
        // Topics and contact come from the base.
        assert_eq!(resp.related_topics.len(), 3);
        assert!(resp.contact_block.is_some());
    }

    #[test]
    fn test_shared_variant_applies_when_department_list_misses() {
        let catalog = Catalog::new();
        let resp = catalog.answer(DepartmentContext::Housing, "pay my rent").unwrap();
        assert_eq!(resp.text, "Proceed to the secure payment gateway below.");

        let resp = catalog.answer(DepartmentContext::Waste, "apply for a bin").unwrap();
        assert_eq!(resp.text, "Start your application using the links below.");
    }

    #[test]
    fn test_department_variant_beats_shared() {
        let catalog = Catalog::new();
        let resp = catalog
            .answer(DepartmentContext::Benefits, "apply for benefits")
            .unwrap();
        assert!(resp.text.contains("[SSN]"));
    }

    #[test]
    fn test_fallback_shape() {
        let catalog = Catalog::new();
        let fb = catalog.fallback();
        assert_eq!(fb.text, FALLBACK_TEXT);
        assert_eq!(fb.actions.len(), 1);
        assert_eq!(fb.actions[0].icon_key, IconKey::Grid);
        assert_eq!(fb.related_topics.len(), 5);
        assert_eq!(fb.contact_block.as_ref().unwrap().phone.as_deref(), Some("311"));
    }
}
