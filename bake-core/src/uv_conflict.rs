//! UV-sharing conflict detection.
//!
//! Baking one texture while two different UV layouts read from it is
//! unsafe, so any material referenced by two or more mesh entities is
//! reported as a conflict. The detail string partitions the entities into
//! identical-UV groups, no-UV entities, and different-UV entities so a
//! caller can decide whether merging is acceptable.

use crate::scene::{MeshData, MeshEntity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute per-axis tolerance for UV coordinate comparison
pub const UV_TOLERANCE: f32 = 1e-4;

/// Result of one conflict check over a material's using entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UvConflictReport {
    pub has_conflict: bool,
    pub detail: String,
    pub object_list: String,
}

/// Check the set of mesh entities bound to one material. Fewer than two
/// entities with mesh data is never a conflict; two or more always is,
/// regardless of whether their UVs match.
pub fn detect_uv_conflict(entities: &[&MeshEntity]) -> UvConflictReport {
    let with_mesh: Vec<&MeshEntity> = entities
        .iter()
        .copied()
        .filter(|e| e.mesh.is_some())
        .collect();

    if with_mesh.len() < 2 {
        return UvConflictReport::default();
    }

    let object_list = with_mesh
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (uv_bearing, no_uv): (Vec<&MeshEntity>, Vec<&MeshEntity>) =
        with_mesh.iter().partition(|e| e.has_uv());

    // union-find over pairwise identical-UV comparisons
    let mut parent: Vec<usize> = (0..uv_bearing.len()).collect();
    for i in 0..uv_bearing.len() {
        for j in (i + 1)..uv_bearing.len() {
            let (Some(a), Some(b)) = (uv_bearing[i].mesh.as_ref(), uv_bearing[j].mesh.as_ref())
            else {
                continue;
            };
            if uv_layouts_match(a, b) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for i in 0..uv_bearing.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(&uv_bearing[i].name);
    }

    let mut parts = Vec::new();
    let mut grouped: Vec<&str> = Vec::new();
    for members in groups.values() {
        if members.len() >= 2 {
            parts.push(format!("identical UVs: {}", members.join(", ")));
            grouped.extend(members);
        }
    }
    if !no_uv.is_empty() {
        parts.push(format!(
            "no UV layer: {}",
            no_uv.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    let different: Vec<&str> = uv_bearing
        .iter()
        .map(|e| e.name.as_str())
        .filter(|n| !grouped.contains(n))
        .collect();
    // only meaningful next to an identical group or a no-UV partition;
    // an all-different set gets the generic fallback instead
    if !different.is_empty() && !parts.is_empty() {
        parts.push(format!("different UVs: {}", different.join(", ")));
    }

    let detail = if parts.is_empty() {
        format!("shared by {} objects", with_mesh.len())
    } else {
        parts.join("; ")
    };

    UvConflictReport {
        has_conflict: true,
        detail,
        object_list,
    }
}

fn find(parent: &mut Vec<usize>, i: usize) -> usize {
    if parent[i] != i {
        let root = find(parent, parent[i]);
        parent[i] = root;
    }
    parent[i]
}

fn union(parent: &mut Vec<usize>, a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[rb] = ra;
    }
}

/// Two UV layouts compare equal when topology matches and sampled active-
/// layer coordinates agree within tolerance, first at a coarse stride and
/// then at a finer confirming stride.
fn uv_layouts_match(a: &MeshData, b: &MeshData) -> bool {
    if a.vertex_count != b.vertex_count || a.face_count != b.face_count {
        return false;
    }
    let (Some(la), Some(lb)) = (a.active_uv_layer(), b.active_uv_layer()) else {
        return false;
    };
    if la.coords.len() != lb.coords.len() {
        return false;
    }
    let n = la.coords.len();
    if n == 0 {
        return true;
    }

    let coarse = (n / 100).max(1);
    if !samples_match(&la.coords, &lb.coords, coarse) {
        return false;
    }
    let fine = (n / 1000).max(1);
    samples_match(&la.coords, &lb.coords, fine)
}

fn samples_match(a: &[[f32; 2]], b: &[[f32; 2]], stride: usize) -> bool {
    (0..a.len()).step_by(stride).all(|i| {
        (a[i][0] - b[i][0]).abs() <= UV_TOLERANCE && (a[i][1] - b[i][1]).abs() <= UV_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshData, MeshEntity, UvLayer};

    fn entity(name: &str, coords: Vec<[f32; 2]>) -> MeshEntity {
        MeshEntity::new(
            name,
            MeshData {
                vertex_count: coords.len(),
                face_count: coords.len() / 4,
                uv_layers: vec![UvLayer {
                    name: "UVMap".to_string(),
                    coords,
                }],
                active_uv: Some(0),
            },
            vec!["mat".to_string()],
        )
    }

    fn entity_no_uv(name: &str) -> MeshEntity {
        MeshEntity::new(
            name,
            MeshData {
                vertex_count: 4,
                face_count: 1,
                uv_layers: Vec::new(),
                active_uv: None,
            },
            vec!["mat".to_string()],
        )
    }

    fn quad() -> Vec<[f32; 2]> {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    #[test]
    fn single_entity_is_never_a_conflict() {
        let a = entity("a", quad());
        assert!(!detect_uv_conflict(&[]).has_conflict);
        assert!(!detect_uv_conflict(&[&a]).has_conflict);
    }

    #[test]
    fn two_entities_always_conflict_even_when_identical() {
        let a = entity("a", quad());
        let b = entity("b", quad());
        let report = detect_uv_conflict(&[&a, &b]);
        assert!(report.has_conflict);
        assert!(report.detail.contains("identical UVs: a, b"));
        assert_eq!(report.object_list, "a, b");
    }

    #[test]
    fn tolerance_groups_and_perturbation_breaks() {
        let a = entity("a", quad());
        let mut close = quad();
        close[2][0] += 9.0e-5; // within 1e-4
        let b = entity("b", close);
        let report = detect_uv_conflict(&[&a, &b]);
        assert!(report.detail.contains("identical UVs"));

        let mut off = quad();
        off[2][0] += 2.0e-4; // outside tolerance
        let c = entity("c", off);
        let report = detect_uv_conflict(&[&a, &c]);
        assert!(!report.detail.contains("identical UVs"));
        assert!(report.has_conflict);
    }

    #[test]
    fn topology_mismatch_prevents_grouping() {
        let a = entity("a", quad());
        let mut b = entity("b", quad());
        b.mesh.as_mut().unwrap().vertex_count = 8;
        let report = detect_uv_conflict(&[&a, &b]);
        assert!(!report.detail.contains("identical UVs"));
    }

    #[test]
    fn no_uv_entities_listed_separately() {
        let a = entity("a", quad());
        let b = entity("b", quad());
        let c = entity_no_uv("c");
        let report = detect_uv_conflict(&[&a, &b, &c]);
        assert!(report.detail.contains("identical UVs: a, b"));
        assert!(report.detail.contains("no UV layer: c"));
    }

    #[test]
    fn all_different_falls_back_to_shared_message() {
        let a = entity("a", quad());
        let mut other = quad();
        other[0] = [0.5, 0.5];
        let b = entity("b", other);
        let report = detect_uv_conflict(&[&a, &b]);
        assert!(report.has_conflict);
        assert_eq!(report.detail, "shared by 2 objects");
    }

    #[test]
    fn different_listed_next_to_identical_group() {
        let a = entity("a", quad());
        let b = entity("b", quad());
        let mut other = quad();
        other[1] = [0.25, 0.75];
        let c = entity("c", other);
        let report = detect_uv_conflict(&[&a, &b, &c]);
        assert!(report.detail.contains("identical UVs: a, b"));
        assert!(report.detail.contains("different UVs: c"));
    }

    #[test]
    fn entities_without_mesh_are_ignored() {
        let a = entity("a", quad());
        let ghost = MeshEntity {
            name: "ghost".to_string(),
            mesh: None,
            material_slots: vec!["mat".to_string()],
        };
        assert!(!detect_uv_conflict(&[&a, &ghost]).has_conflict);
    }
}
