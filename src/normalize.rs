use crate::agent;
use crate::error::{Error, Result};
use crate::model::{Heartbeat, RawHeartbeat};

const UNKNOWN: &str = "Unknown";

/// Source of ids for new heartbeats. Must be safe to call from many requests at once.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4;

impl IdGenerator for UuidV4 {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN.to_owned(),
    }
}

/// Turns a submission into a storable heartbeat.
///
/// Empty `project`, `language` and `branch` become `"Unknown"`; everything
/// else passes through untouched. `entity` and `time` are required.
pub fn normalize(raw: RawHeartbeat, ids: &dyn IdGenerator) -> Result<Heartbeat> {
    let entity = match raw.entity {
        Some(e) if !e.is_empty() => e,
        _ => return Err(Error::invalid("entity is required")),
    };
    let time = raw.time.ok_or_else(|| Error::invalid("time is required"))?;

    let (os, editor) = agent::detect(raw.user_agent.as_deref().unwrap_or_default());

    Ok(Heartbeat {
        id: ids.next_id(),
        entity,
        project: or_unknown(raw.project),
        language: or_unknown(raw.language),
        branch: or_unknown(raw.branch),
        os,
        editor,
        time,
        machine_name: raw.machine_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sequence(AtomicUsize);

    impl IdGenerator for Sequence {
        fn next_id(&self) -> String {
            format!("hb-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn raw() -> RawHeartbeat {
        RawHeartbeat {
            entity: Some("/home/me/waka/src/main.rs".to_owned()),
            time: Some(1_660_000_000_000),
            ..RawHeartbeat::default()
        }
    }

    #[test]
    fn fills_defaults() {
        let hb = normalize(
            RawHeartbeat {
                language: Some(String::new()),
                ..raw()
            },
            &UuidV4,
        )
        .unwrap();

        assert_eq!(hb.language, "Unknown");
        assert_eq!(hb.project, "Unknown");
        assert_eq!(hb.branch, "Unknown");
        assert_eq!(hb.os, "unknown");
        assert_eq!(hb.editor, "unknown");
        assert_eq!(hb.entity, "/home/me/waka/src/main.rs");
        assert_eq!(hb.time, 1_660_000_000_000);
    }

    #[test]
    fn passes_values_through() {
        let hb = normalize(
            RawHeartbeat {
                language: Some("Go".to_owned()),
                project: Some(" waka ".to_owned()),
                branch: Some("Feature/X".to_owned()),
                user_agent: Some("wakatime/1.0 (windows-10.0) go1.19 vscode/1.71.0".to_owned()),
                machine_name: Some("desk".to_owned()),
                ..raw()
            },
            &UuidV4,
        )
        .unwrap();

        assert_eq!(hb.language, "Go");
        assert_eq!(hb.project, " waka ");
        assert_eq!(hb.branch, "Feature/X");
        assert_eq!(hb.os, "Windows");
        assert_eq!(hb.editor, "VS Code");
        assert_eq!(hb.machine_name.as_deref(), Some("desk"));
    }

    #[test]
    fn assigns_fresh_ids() {
        let ids = Sequence(AtomicUsize::new(0));
        assert_eq!(normalize(raw(), &ids).unwrap().id, "hb-0");
        assert_eq!(normalize(raw(), &ids).unwrap().id, "hb-1");

        let a = normalize(raw(), &UuidV4).unwrap();
        let b = normalize(raw(), &UuidV4).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn rejects_missing_entity_or_time() {
        let no_entity = RawHeartbeat {
            entity: None,
            ..raw()
        };
        assert!(matches!(normalize(no_entity, &UuidV4), Err(Error::InvalidInput(_))));

        let empty_entity = RawHeartbeat {
            entity: Some(String::new()),
            ..raw()
        };
        assert!(matches!(normalize(empty_entity, &UuidV4), Err(Error::InvalidInput(_))));

        let no_time = RawHeartbeat { time: None, ..raw() };
        assert!(matches!(normalize(no_time, &UuidV4), Err(Error::InvalidInput(_))));
    }
}
