use std::path::Path;

use crate::record::{Artifact, ArtifactKind, ExecutionRecord};
use crate::runner::ArtifactClaim;

/// Project-relative form of a claimed path.
pub fn normalize_path(path: &str, root: &Path) -> String {
    let p = Path::new(path);
    let rel = p.strip_prefix(root).unwrap_or(p);
    let s = rel.to_string_lossy().replace('\\', "/");
    s.trim_start_matches("./").to_string()
}

/// Records every claimed file as an unverified artifact. Returns how many were new.
pub fn record_claims(record: &mut ExecutionRecord, claims: &[ArtifactClaim], root: &Path) -> usize {
    let mut added = 0;
    for claim in claims {
        let path = normalize_path(&claim.path, root);
        if path.is_empty() {
            continue;
        }
        match record.artifact_mut(&path) {
            Some(existing) => {
                // A file created earlier in the run stays `created` when later edited.
                if !(existing.kind == ArtifactKind::Created && claim.kind == ArtifactKind::Modified) {
                    existing.kind = claim.kind;
                }
                existing.verified = false;
            }
            None => {
                record.artifacts.push(Artifact {
                    path,
                    kind: claim.kind,
                    verified: false,
                    hallucination_detected: None,
                });
                added += 1;
            }
        }
    }
    added
}

/// Confirms artifacts against the file system: present for created/modified,
/// absent for deleted. Returns paths that failed verification.
pub fn verify_artifacts(record: &mut ExecutionRecord, root: &Path) -> Vec<String> {
    let mut unverified = Vec::new();
    for artifact in &mut record.artifacts {
        let exists = root.join(&artifact.path).exists();
        artifact.verified = match artifact.kind {
            ArtifactKind::Deleted => !exists,
            ArtifactKind::Created | ArtifactKind::Modified => exists,
        };
        if artifact.verified && artifact.hallucination_detected == Some(true) {
            artifact.hallucination_detected = Some(false);
        }
        if !artifact.verified {
            unverified.push(artifact.path.clone());
        }
    }
    unverified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(path: &str, kind: ArtifactKind) -> ArtifactClaim {
        ArtifactClaim {
            path: path.into(),
            kind,
        }
    }

    #[test]
    fn claims_become_unverified_artifacts() {
        let root = Path::new("/work/project");
        let mut r = ExecutionRecord::seeded([(1, "Only".to_string())]);
        let added = record_claims(
            &mut r,
            &[
                claim("/work/project/src/a.rs", ArtifactKind::Created),
                claim("./src/b.rs", ArtifactKind::Modified),
                claim("src/a.rs", ArtifactKind::Modified),
            ],
            root,
        );
        assert_eq!(added, 2);
        assert_eq!(r.artifacts[0].path, "src/a.rs");
        assert_eq!(r.artifacts[0].kind, ArtifactKind::Created);
        assert_eq!(r.artifacts[1].path, "src/b.rs");
        assert!(r.artifacts.iter().all(|a| !a.verified));
    }

    #[test]
    fn verification_follows_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();

        let mut r = ExecutionRecord::seeded([(1, "Only".to_string())]);
        record_claims(
            &mut r,
            &[
                claim("present.txt", ArtifactKind::Created),
                claim("absent.txt", ArtifactKind::Modified),
                claim("gone.txt", ArtifactKind::Deleted),
            ],
            dir.path(),
        );
        let unverified = verify_artifacts(&mut r, dir.path());
        assert_eq!(unverified, vec!["absent.txt".to_string()]);
        assert!(r.artifacts[0].verified);
        assert!(r.artifacts[2].verified);
    }
}
