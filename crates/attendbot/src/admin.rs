//! Store administration behind the `add-group` and `groups` commands.

use attendcore::{CredentialStore, GroupSummary};

/// Creates `name` unless it exists and returns a line for the operator.
pub async fn add_group(store: &dyn CredentialStore, name: &str, relevant: bool) -> anyhow::Result<String> {
    let name = name.trim();
    if name.is_empty() || name.split_whitespace().nth(1).is_some() {
        anyhow::bail!("group name must be a single non-empty word, got {:?}", name);
    }

    let created = store.ensure_group(name, relevant).await?;
    Ok(if created {
        log::info!("Created group {:?} (relevance: {})", name, relevant);
        format!("Group {} created", name)
    } else {
        format!("Group {} already exists", name)
    })
}

/// Renders the group listing as a plain table.
pub async fn list_groups(store: &dyn CredentialStore) -> anyhow::Result<String> {
    let groups = store.groups().await?;
    Ok(render(&groups))
}

fn render(groups: &[GroupSummary]) -> String {
    if groups.is_empty() {
        return "No groups".to_string();
    }

    let width = groups.iter().map(|g| g.name.chars().count()).max().unwrap_or(0).max(5);
    let mut out = format!("{:<width$}  {:>8}  {:>8}  {:>8}\n", "GROUP", "RELEVANT", "STUDENTS", "PRESENT");
    for group in groups {
        out.push_str(&format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}\n",
            group.name,
            if group.relevance { "yes" } else { "no" },
            group.students,
            group.present,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendcore::store::MemoryStore;
    use attendcore::GroupPolicy;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_add_group_twice() {
        let store = MemoryStore::new(GroupPolicy::RequireExisting);
        assert_eq!(add_group(&store, "CS-101", true).await.unwrap(), "Group CS-101 created");
        assert_eq!(add_group(&store, " CS-101 ", false).await.unwrap(), "Group CS-101 already exists");
        assert!(store.groups().await.unwrap()[0].relevance);
    }

    #[tokio::test]
    async fn test_add_group_rejects_bad_names() {
        let store = MemoryStore::new(GroupPolicy::RequireExisting);
        assert!(add_group(&store, "", false).await.is_err());
        assert!(add_group(&store, "CS 101", false).await.is_err());
    }

    #[tokio::test]
    async fn test_list_groups() {
        let store = MemoryStore::new(GroupPolicy::AutoCreate);
        assert_eq!(list_groups(&store).await.unwrap(), "No groups");

        store.ensure_group("CS-101", true).await.unwrap();
        store.insert_if_absent("CS-101", "alice", "d").await.unwrap();
        store.toggle("CS-101", "alice", true).await.unwrap();

        let listing = list_groups(&store).await.unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("GROUP"));
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec!["CS-101", "yes", "1", "1"]
        );
    }
}
