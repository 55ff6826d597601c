use story_catalog::{EntityCatalog, EntityKind, VocabularyLevel};

const CATALOG: &str = r#"
[[characters]]
name = "Kael Thornwood"
role = "protagonist"
physical_description = "Tall, with a scar across his cheek"
personality = "Quiet and brave"
vocabulary_level = "archaic"
verbal_tics = ["Hm."]

[[characters.relationships]]
target = "Lyria"
kind = "ally"
description = "Uneasy partnership"

[[characters]]
name = "Lyria"

[[locations]]
name = "The Citadel"
location_type = "building"
connected_to = ["Harbour"]

[[artifacts]]
name = "Amulet of Dawn"
current_holder = "Lyria"
current_location = "The Citadel"

[[events]]
name = "The Sundering"
participants = ["Lyria"]
ongoing_consequences = "Magic is unstable"

[[world_rules]]
name = "Silence Wards"
statement = "No magic inside the walls"
location_restrictions = ["Citadel"]
character_restrictions = ["Lyria"]
"#;

#[test]
fn test_parse_catalog() {
    let catalog = EntityCatalog::from_toml_str(CATALOG).unwrap();

    assert_eq!(catalog.len(), 6);
    let kael = catalog.character("Kael Thornwood").unwrap();
    assert_eq!(kael.vocabulary_level, Some(VocabularyLevel::Archaic));
    assert_eq!(kael.relationship_to("Lyria").map(|r| r.kind.as_str()), Some("ally"));
    assert!(catalog.artifact("Amulet of Dawn").unwrap().is_named_by("amulet"));

    // Ids are generated when the file has none, and stay unique.
    let lyria = catalog.character("Lyria").unwrap();
    assert_ne!(kael.id, lyria.id);
}

#[test]
fn test_rename_rewrites_catalog_references() {
    let mut catalog = EntityCatalog::from_toml_str(CATALOG).unwrap();
    let lyria = catalog.character("Lyria").unwrap().id;

    let rename = catalog.rename(lyria, "Lyria Vane").unwrap();
    assert_eq!(rename.kind, EntityKind::Character);
    assert_eq!(rename.old_name, "Lyria");

    let kael = catalog.character("Kael Thornwood").unwrap();
    assert!(kael.relationship_to("Lyria Vane").is_some());
    assert_eq!(
        catalog.artifact("Amulet of Dawn").unwrap().current_holder.as_deref(),
        Some("Lyria Vane")
    );
    assert_eq!(catalog.events[0].participants, vec!["Lyria Vane"]);
    assert_eq!(catalog.world_rules[0].character_restrictions, vec!["Lyria Vane"]);
    assert_eq!(catalog.lookup(lyria), Some((EntityKind::Character, "Lyria Vane")));
}

#[test]
fn test_rename_location_follows_items() {
    let mut catalog = EntityCatalog::from_toml_str(CATALOG).unwrap();
    let citadel = catalog.location("The Citadel").unwrap().id;

    catalog.rename(citadel, "The Northern Citadel").unwrap();
    assert_eq!(
        catalog.artifact("Amulet of Dawn").unwrap().current_location.as_deref(),
        Some("The Northern Citadel")
    );
}
