use serde::{Deserialize, Serialize};
use tracing::debug;

use super::query::blank_as_none_parsed;
use crate::error::{AssistError, Result};
use crate::models::Clinic;

/// Clinic search criteria. Unset fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicFilter {
    pub location: Option<String>,
    pub plan: Option<String>,
    pub specialty: Option<String>,
    #[serde(deserialize_with = "blank_as_none_parsed")]
    pub min_rating: Option<f32>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ClinicFilter {
    pub fn matches(&self, clinic: &Clinic) -> bool {
        if let Some(plan) = non_blank(&self.plan) {
            if !clinic.plans.iter().any(|p| p == plan) {
                return false;
            }
        }
        if let Some(specialty) = non_blank(&self.specialty) {
            if !clinic.specialties.iter().any(|s| s == specialty) {
                return false;
            }
        }
        if let Some(min) = self.min_rating.filter(|m| *m > 0.0) {
            if clinic.rating < min {
                return false;
            }
        }
        if let Some(location) = non_blank(&self.location) {
            if !clinic.address.to_lowercase().contains(&location.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Display name of a specialty code; unknown codes are returned as-is.
pub fn specialty_name(code: &str) -> &str {
    match code {
        "geral" => "Clínico Geral",
        "ortodontia" => "Ortodontia",
        "implante" => "Implante",
        "endodontia" => "Endodontia",
        "periodontia" => "Periodontia",
        "estetica" => "Estética",
        "cirurgia" => "Cirurgia",
        "preventiva" => "Preventiva",
        other => other,
    }
}

#[allow(clippy::too_many_arguments)]
fn clinic(
    id: u32,
    name: &str,
    address: &str,
    phone: &str,
    rating: f32,
    specialties: &[&str],
    plans: &[&str],
    distance: &str,
    opening_hours: &str,
    about: &str,
) -> Clinic {
    Clinic {
        id,
        name: name.to_string(),
        address: address.to_string(),
        phone: phone.to_string(),
        rating,
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
        plans: plans.iter().map(|p| p.to_string()).collect(),
        distance: distance.to_string(),
        opening_hours: opening_hours.to_string(),
        about: about.to_string(),
    }
}

/// The partner clinics listed in the app.
pub fn partner_clinics() -> Vec<Clinic> {
    vec![
        clinic(
            1,
            "Sorriso Perfeito Odontologia",
            "Rua das Flores, 123 - Jardim Paulista, São Paulo - SP, 01415-001",
            "(11) 3333-4444",
            4.8,
            &["geral", "ortodontia", "implante"],
            &["basic", "premium", "vip"],
            "0.8 km",
            "Seg-Sex: 8h-19h | Sáb: 8h-14h",
            "Clínica especializada em ortodontia e implantes dentários com mais de 15 anos de experiência.",
        ),
        clinic(
            2,
            "Dental Care Center",
            "Av. Paulista, 1000 - Bela Vista, São Paulo - SP, 01310-100",
            "(11) 2222-3333",
            4.5,
            &["geral", "endodontia", "periodontia"],
            &["basic", "premium"],
            "1.2 km",
            "Seg-Sex: 7h-20h | Sáb: 8h-12h",
            "Centro odontológico completo com atendimento emergencial e especialidades diversas.",
        ),
        clinic(
            3,
            "Clínica Dental Sorriso Saudável",
            "Rua Augusta, 500 - Consolação, São Paulo - SP, 01305-000",
            "(11) 4444-5555",
            4.9,
            &["geral", "ortodontia", "estetica"],
            &["premium", "vip"],
            "1.5 km",
            "Seg-Sex: 9h-18h",
            "Clínica premium focada em estética dental e ortodontia invisível.",
        ),
        clinic(
            4,
            "Odonto Excellence",
            "Alameda Santos, 200 - Cerqueira César, São Paulo - SP, 01418-000",
            "(11) 5555-6666",
            4.7,
            &["geral", "implante", "cirurgia"],
            &["basic", "vip"],
            "2.1 km",
            "Seg-Sex: 8h-19h | Sáb: 8h-13h",
            "Especialistas em implantes dentários e cirurgias bucomaxilofaciais.",
        ),
        clinic(
            5,
            "Dental Sorriso & Cia",
            "Rua Haddock Lobo, 300 - Cerqueira César, São Paulo - SP, 01414-000",
            "(11) 6666-7777",
            4.4,
            &["geral", "preventiva"],
            &["basic"],
            "2.5 km",
            "Seg-Sex: 8h-18h",
            "Clínica familiar com foco em odontologia preventiva e tratamentos básicos.",
        ),
    ]
}

pub struct ClinicsController {
    clinics: Vec<Clinic>,
}

impl ClinicsController {
    pub fn new() -> Self {
        Self::with_clinics(partner_clinics())
    }

    pub fn with_clinics(clinics: Vec<Clinic>) -> Self {
        Self { clinics }
    }

    pub fn search(&self, filter: &ClinicFilter) -> Vec<Clinic> {
        let found: Vec<Clinic> = self
            .clinics
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        debug!(found = found.len(), ?filter, "Clinic search");
        found
    }

    pub fn get(&self, id: u32) -> Result<Clinic> {
        self.clinics
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| AssistError::NotFound(format!("clinic {id}")))
    }
}

impl Default for ClinicsController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(clinics: &[Clinic]) -> Vec<u32> {
        clinics.iter().map(|c| c.id).collect()
    }

    #[test]
    fn no_filter_returns_all() {
        let clinics = ClinicsController::new();
        assert_eq!(ids(&clinics.search(&ClinicFilter::default())), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn filters_combine() {
        let clinics = ClinicsController::new();

        let vip = clinics.search(&ClinicFilter {
            plan: Some("vip".into()),
            ..Default::default()
        });
        assert_eq!(ids(&vip), vec![1, 3, 4]);

        let vip_implant = clinics.search(&ClinicFilter {
            plan: Some("vip".into()),
            specialty: Some("implante".into()),
            min_rating: Some(4.75),
            ..Default::default()
        });
        assert_eq!(ids(&vip_implant), vec![1]);

        let cerqueira = clinics.search(&ClinicFilter {
            location: Some("cerqueira césar".into()),
            ..Default::default()
        });
        assert_eq!(ids(&cerqueira), vec![4, 5]);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let clinics = ClinicsController::new();
        let all = clinics.search(&ClinicFilter {
            location: Some("  ".into()),
            plan: Some(String::new()),
            min_rating: Some(0.0),
            ..Default::default()
        });
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn empty_query_values_deserialize_as_unset() {
        let filter: ClinicFilter =
            serde_json::from_str(r#"{"plan":"","min_rating":"","specialty":"implante"}"#)
                .unwrap();
        assert!(filter.min_rating.is_none());
        assert_eq!(ids(&ClinicsController::new().search(&filter)), vec![1, 4]);

        let filter: ClinicFilter = serde_json::from_str(r#"{"min_rating":"4.8"}"#).unwrap();
        assert_eq!(filter.min_rating, Some(4.8));
    }

    #[test]
    fn lookup_by_id() {
        let clinics = ClinicsController::new();
        assert_eq!(clinics.get(2).unwrap().name, "Dental Care Center");
        assert!(matches!(clinics.get(42), Err(AssistError::NotFound(_))));
    }

    #[test]
    fn specialty_names() {
        assert_eq!(specialty_name("estetica"), "Estética");
        assert_eq!(specialty_name("radiologia"), "radiologia");
    }
}
