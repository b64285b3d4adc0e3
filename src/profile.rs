//! The profile filter: reduces a `ResultSet` to the URIs relevant under a
//! chosen policy, computes an agreement-weighted consensus confidence, and
//! produces the per-license summary counts the renderer consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::BackendWeights;
use crate::license::License;
use crate::result::ResultSet;

/// `{Licenses, Exclude}` — inclusive mode keeps a URI iff it has at least
/// one license in the set; exclusive mode keeps it iff it has at least one
/// license *not* in the set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub licenses: Vec<License>,
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    #[allow(dead_code)]
    pub comment: String,
}

impl Profile {
    /// `true` iff `licenses` passes the inclusion test for this profile.
    pub fn includes(&self, licenses: &[License]) -> bool {
        if self.exclude {
            licenses.iter().any(|l| !self.licenses.contains(l))
        } else {
            licenses.iter().any(|l| self.licenses.contains(l))
        }
    }
}

/// One URI's projection: the union of licenses found by any backend, the
/// weighted consensus confidence, and the per-backend breakdown for
/// callers that want to inspect disagreement.
#[derive(Debug, Clone, Serialize)]
pub struct FilteredEntry {
    pub uid: String,
    pub licenses: Vec<License>,
    pub confidence: f64,
    pub by_backend: BTreeMap<String, f64>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilteredReport {
    pub entries: Vec<FilteredEntry>,
    pub license_counts: BTreeMap<String, usize>,
}

/// A `None` profile keeps every URI.
pub fn filter(results: &ResultSet, profile: Option<&Profile>, weights: &BackendWeights) -> FilteredReport {
    let mut entries = Vec::new();

    for (uid, per_backend) in results.iter() {
        let mut licenses: Vec<License> = Vec::new();
        let mut by_backend = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;

        for (backend_id, result) in per_backend {
            if let Some(reason) = &result.skip {
                skipped.push(format!("{backend_id}: {reason}"));
            }
            for license in &result.licenses {
                if !licenses.contains(license) {
                    licenses.push(license.clone());
                }
            }
            let w = weights.weight(backend_id);
            by_backend.insert(backend_id.clone(), result.confidence);
            total_weight += w;
            weighted_sum += w * result.confidence;
        }

        let keep = match profile {
            None => true,
            Some(p) => p.includes(&licenses),
        };
        if !keep {
            continue;
        }

        let confidence = if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 };
        entries.push(FilteredEntry { uid: uid.clone(), licenses, confidence, by_backend, skipped });
    }

    let mut license_counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &entries {
        for license in &entry.licenses {
            *license_counts.entry(license.render()).or_insert(0) += 1;
        }
    }

    FilteredReport { entries, license_counts }
}
