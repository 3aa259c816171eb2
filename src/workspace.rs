//! Feeds an [ImportWorkspaceBuilder] from a workspace folder.
//!
//! Every root `*.yaml` file that declares a space class describes one space; the space's items are
//! the `*.md` files of its same-named directory, nested through same-named sub-directories.
//! `settings.yaml` at the root carries the project types. Any other file in the tree is an
//! attachment and is uploaded as a blob.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, path::Path};
use walkdir::WalkDir;

use crate::{
    builder::{
        Fields, ImportContainer, ImportNode, ImportProjectType, ImportWorkspaceBuilder, ItemClass,
        SpaceClass,
    },
    codec::{get_str, FormatParser, Header, CONTENT_EXTENSION, SCHEMA_EXTENSION},
    config::CONFIG_FILE_NAME,
    error::ImportError,
    paths::{has_extension, is_hidden, leading_number, list_dir, PathKey},
    properties::StableId,
    registry::MetadataRegistry,
    resolver::FileRecord,
    schema::SchemaKind,
};

pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    #[serde(default)]
    pub project_types: Vec<ImportProjectType>,
}

impl WorkspaceSettings {
    /// Reads `settings.yaml` under `root`. A missing file means no settings.
    pub fn load(parser: &FormatParser, root: &Path) -> Result<WorkspaceSettings, ImportError> {
        let path = PathKey::new(root.join(SETTINGS_FILE_NAME));
        if !path.as_path().is_file() {
            tracing::debug!("[WorkspaceSettings::load] No {SETTINGS_FILE_NAME} in {}", root.display());
            return Ok(WorkspaceSettings::default());
        }
        let document = parser.load_yaml(&path)?;
        Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(document))?)
    }
}

/// The space an item is being loaded into.
struct SpaceScope<'s> {
    path: &'s PathKey,
    class: SpaceClass,
    identifier: Option<String>,
}

pub struct WorkspaceLoader<'a> {
    registry: &'a mut MetadataRegistry,
    parser: &'a FormatParser,
}

impl<'a> WorkspaceLoader<'a> {
    pub fn new(registry: &'a mut MetadataRegistry, parser: &'a FormatParser) -> Self {
        WorkspaceLoader { registry, parser }
    }

    /// Adds every project type, space and item found under `root` to `builder`.
    pub fn load(
        &mut self,
        root: &Path,
        builder: &mut ImportWorkspaceBuilder,
    ) -> Result<(), ImportError> {
        let settings = WorkspaceSettings::load(self.parser, root)?;
        for project_type in settings.project_types {
            builder.add_project_type(project_type)?;
        }

        let listing = list_dir(root)?;
        for file in listing.files_with_extension(SCHEMA_EXTENSION) {
            let path = PathKey::new(file);
            if path.file_name() == SETTINGS_FILE_NAME {
                continue;
            }
            let header = self.parser.load_yaml(&path)?;
            let Some(class) = get_str(&header, "class") else {
                tracing::warn!("[WorkspaceLoader::load] Skipping {path}: no class");
                continue;
            };
            if let Some(space_class) = SpaceClass::parse(class) {
                self.load_space(&path, space_class, header, builder)?;
            } else if SchemaKind::from_class(Some(class)).is_known() {
                tracing::debug!("[WorkspaceLoader::load] {path} is a schema file");
            } else {
                builder.reject(
                    &path.to_string(),
                    ImportError::UnknownClass {
                        path: path.to_string(),
                        class: class.to_string(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Every non-hidden file under `root` that is neither an item, a schema file nor import
    /// configuration, keyed by path.
    pub fn collect_files(
        &mut self,
        root: &Path,
    ) -> Result<BTreeMap<PathKey, FileRecord>, ImportError> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = entry.path();
            if has_extension(file, CONTENT_EXTENSION)
                || has_extension(file, SCHEMA_EXTENSION)
                || (entry.depth() == 1 && entry.file_name() == CONFIG_FILE_NAME)
            {
                continue;
            }
            let path = PathKey::new(file);
            let record = FileRecord::read(&path, self.registry.blob_id(&path))?;
            tracing::debug!("[WorkspaceLoader::collect_files] Attachment {path}");
            files.insert(path, record);
        }
        Ok(files)
    }

    fn load_space(
        &mut self,
        file: &PathKey,
        class: SpaceClass,
        header: Header,
        builder: &mut ImportWorkspaceBuilder,
    ) -> Result<(), ImportError> {
        let dir = file.companion_dir();
        let space_path = PathKey::new(&dir);
        let fields = to_fields(header)?;
        let identifier = fields
            .get("identifier")
            .and_then(Value::as_str)
            .map(str::to_string);
        let id = self.registry.id(&space_path);
        let title = fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.registry.set_mention(&space_path, class.as_str(), &title, None);
        tracing::info!("[WorkspaceLoader::load_space] {} '{title}' at {space_path}", class.as_str());
        builder.add_space(ImportContainer::new(id, class, space_path.clone(), fields))?;

        if dir.is_dir() {
            let scope = SpaceScope {
                path: &space_path,
                class,
                identifier,
            };
            self.load_items(&scope, &dir, None, builder)?;
        }
        Ok(())
    }

    fn load_items(
        &mut self,
        scope: &SpaceScope<'_>,
        dir: &Path,
        parent: Option<&PathKey>,
        builder: &mut ImportWorkspaceBuilder,
    ) -> Result<(), ImportError> {
        let listing = list_dir(dir)?;
        for sub_dir in &listing.dirs {
            if !PathKey::companion_file(sub_dir, CONTENT_EXTENSION).as_path().is_file() {
                tracing::debug!(
                    "[WorkspaceLoader::load_items] Skipping {}: no parent item",
                    sub_dir.display()
                );
            }
        }
        for file in listing.files_with_extension(CONTENT_EXTENSION) {
            let path = PathKey::new(file);
            if !self.load_item(scope, &path, parent, builder)? {
                continue;
            }
            let children = path.companion_dir();
            if children.is_dir() {
                self.load_items(scope, &children, Some(&path), builder)?;
            }
        }
        Ok(())
    }

    /// Returns whether the file was handed to the builder.
    fn load_item(
        &mut self,
        scope: &SpaceScope<'_>,
        path: &PathKey,
        parent: Option<&PathKey>,
        builder: &mut ImportWorkspaceBuilder,
    ) -> Result<bool, ImportError> {
        let header = self.parser.load_header(path)?;
        let Some(class_name) = get_str(&header, "class") else {
            tracing::debug!("[WorkspaceLoader::load_item] Skipping {path}: no class");
            return Ok(false);
        };
        let class = match ItemClass::parse(class_name) {
            Some(class) if scope.class.accepts(class) => class,
            _ => {
                builder.reject(
                    &path.to_string(),
                    ImportError::UnknownClass {
                        path: path.to_string(),
                        class: class_name.to_string(),
                    },
                )?;
                return Ok(false);
            }
        };

        let mut fields = to_fields(header)?;
        let body = self.parser.read_body(path.as_path())?;
        fields.insert("content".to_string(), Value::String(body));
        let id = self.registry.id(path);
        let prefix = leading_number(&path.file_name());
        let title = fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match class {
            ItemClass::Issue => {
                let number = prefix.or_else(|| fields.get("number").and_then(Value::as_u64));
                let mention = match (&scope.identifier, number) {
                    (Some(identifier), Some(number)) => format!("{identifier}-{number}"),
                    _ => title,
                };
                if let Some(number) = number {
                    fields.insert("number".to_string(), Value::from(number));
                }
                self.registry.set_mention(path, class.as_str(), &mention, None);
            }
            ItemClass::Document => {
                self.registry.set_mention(path, class.as_str(), &title, None);
            }
            ItemClass::ControlledDocument | ItemClass::DocumentTemplate => {
                if let Some(template) = fields.get("template").and_then(Value::as_str) {
                    let template_id = self.registry.id(&path.resolve(template));
                    fields.insert("template".to_string(), Value::String(template_id.to_string()));
                }
                if let Some(seq) = prefix {
                    fields.insert("seqNumber".to_string(), Value::from(seq));
                }
                fields.entry("major").or_insert_with(|| Value::from(0));
                fields.entry("minor").or_insert_with(|| Value::from(1));
                fields
                    .entry("state")
                    .or_insert_with(|| Value::String(crate::builder::validate::DRAFT_STATE.into()));
                let meta_id = StableId::generate();
                fields.insert("documentMeta".to_string(), Value::String(meta_id.to_string()));
                self.registry
                    .set_mention(path, class.as_str(), &title, Some(meta_id));
            }
        }

        tracing::debug!("[WorkspaceLoader::load_item] {} {path}", class.as_str());
        builder.add_item(
            scope.path,
            ImportNode::new(id, class, path.clone(), fields),
            parent.cloned(),
        )?;
        Ok(true)
    }
}

/// Header as JSON fields, without `class`.
fn to_fields(mut header: Header) -> Result<Fields, ImportError> {
    header.remove("class");
    match serde_json::to_value(&header)? {
        Value::Object(fields) => Ok(fields),
        other => Err(ImportError::Serialization(format!(
            "expected a header object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ImportMode, source::StaticTypeLookup};
    use std::fs;
    use tempfile::TempDir;
    use test_log::test;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    async fn load(root: &Path, mode: ImportMode) -> Result<ImportWorkspaceBuilder, ImportError> {
        let lookup = StaticTypeLookup::new(["Todo", "Done"], ["Policy"]);
        let mut builder = ImportWorkspaceBuilder::new(mode);
        builder.init_cache(&lookup).await?;
        let mut registry = MetadataRegistry::new();
        let parser = FormatParser::default();
        WorkspaceLoader::new(&mut registry, &parser).load(root, &mut builder)?;
        Ok(builder)
    }

    #[test(tokio::test)]
    async fn loads_projects_and_nested_issues() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "settings.yaml",
            "projectTypes:\n  - name: Classic\n    taskTypes:\n      - name: Task\n        statuses:\n          - name: Todo\n",
        );
        write(
            root,
            "Backend.yaml",
            "class: tracker:class:Project\ntitle: Backend\nidentifier: BE\nprojectType: Classic\n",
        );
        write(
            root,
            "Backend/1.Login.md",
            "---\nclass: tracker:class:Issue\ntitle: Login\nstatus: Todo\n---\nBroken.\n",
        );
        write(
            root,
            "Backend/1.Login/2.Button.md",
            "---\nclass: tracker:class:Issue\ntitle: Button\nstatus: Done\n---\n",
        );
        write(root, "Backend/notes.md", "no header here\n");

        let workspace = load(root, ImportMode::Strict).await.unwrap().build().unwrap();
        assert_eq!(workspace.project_types.len(), 1);
        assert_eq!(workspace.spaces.len(), 1);
        let space = &workspace.spaces[0];
        assert_eq!(space.items.len(), 1);
        let login = &space.items[0];
        assert_eq!(login.field("number"), Some(&Value::from(1)));
        assert_eq!(login.field("content"), Some(&Value::from("Broken.\n")));
        assert_eq!(login.children.len(), 1);
        assert_eq!(login.children[0].field("number"), Some(&Value::from(2)));
    }

    #[test(tokio::test)]
    async fn issue_mentions_use_the_project_identifier() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "Backend.yaml", "class: Project\ntitle: Backend\nidentifier: BE\n");
        write(
            root,
            "Backend/7.Crash.md",
            "---\nclass: Issue\ntitle: Crash\nstatus: Todo\n---\n",
        );

        let lookup = StaticTypeLookup::new(["Todo"], Vec::<String>::new());
        let mut builder = ImportWorkspaceBuilder::new(ImportMode::Strict);
        builder.init_cache(&lookup).await.unwrap();
        let mut registry = MetadataRegistry::new();
        let parser = FormatParser::default();
        WorkspaceLoader::new(&mut registry, &parser)
            .load(root, &mut builder)
            .unwrap();

        let mention = registry
            .mention(&PathKey::new(root.join("Backend/7.Crash.md")))
            .unwrap();
        assert_eq!(mention.title, "BE-7");
        assert_eq!(mention.class, "Issue");
    }

    #[test(tokio::test)]
    async fn controlled_documents_get_defaults_and_template_ids() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "QMS.yaml", "class: OrgSpace\ntitle: QMS\n");
        write(
            root,
            "QMS/SOP.md",
            "---\nclass: DocumentTemplate\ntitle: SOP\ndocPrefix: SOP\ncode: T-1\n---\n",
        );
        write(
            root,
            "QMS/3.Hygiene.md",
            "---\nclass: ControlledDocument\ntitle: Hygiene\ntemplate: SOP.md\ncategory: Policy\n---\n",
        );

        let workspace = load(root, ImportMode::Strict).await.unwrap().build().unwrap();
        let space = &workspace.spaces[0];
        let template = space
            .items
            .iter()
            .find(|n| n.class == ItemClass::DocumentTemplate)
            .unwrap();
        let doc = space
            .items
            .iter()
            .find(|n| n.class == ItemClass::ControlledDocument)
            .unwrap();
        assert_eq!(doc.field("template"), Some(&Value::from(template.id.to_string())));
        assert_eq!(doc.field("seqNumber"), Some(&Value::from(3)));
        assert_eq!(doc.field("major"), Some(&Value::from(0)));
        assert_eq!(doc.field("minor"), Some(&Value::from(1)));
        assert_eq!(doc.field("state"), Some(&Value::from("draft")));
        assert!(doc.field("documentMeta").is_some());
    }

    #[test(tokio::test)]
    async fn directories_without_a_parent_item_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "Backend.yaml", "class: Project\ntitle: Backend\nidentifier: BE\n");
        write(
            root,
            "Backend/1.Login.md",
            "---\nclass: Issue\ntitle: Login\nstatus: Todo\n---\n",
        );
        write(
            root,
            "Backend/drafts/2.Draft.md",
            "---\nclass: Issue\ntitle: Draft\nstatus: Todo\n---\n",
        );

        let workspace = load(root, ImportMode::Strict).await.unwrap().build().unwrap();
        assert_eq!(workspace.item_count(), 1);
        assert!(workspace.report.is_valid());
    }

    #[test]
    fn collects_attachments_outside_items_and_schemas() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "import.toml", "mode = \"strict\"\n");
        write(root, "settings.yaml", "projectTypes: []\n");
        write(root, "Backend.yaml", "class: Project\ntitle: Backend\nidentifier: BE\n");
        write(root, "Backend/1.Login.md", "---\nclass: Issue\ntitle: Login\n---\n");
        write(root, "Backend/screenshot.png", "png");
        write(root, "Backend/1.Login/trace.log", "boom");
        write(root, "Backend/.cache/state.bin", "hidden");
        write(root, ".git/HEAD", "ref: main");

        let mut registry = MetadataRegistry::new();
        let parser = FormatParser::default();
        let files = WorkspaceLoader::new(&mut registry, &parser)
            .collect_files(root)
            .unwrap();
        let names: Vec<String> = files.values().map(|file| file.name.clone()).collect();
        assert_eq!(names, vec!["trace.log", "screenshot.png"]);

        let screenshot = PathKey::new(root.join("Backend/screenshot.png"));
        let record = &files[&screenshot];
        assert_eq!(record.size, 3);
        assert_eq!(record.content_type, "image/png");
        assert_eq!(record.id, registry.blob_id(&screenshot));
    }

    #[test(tokio::test)]
    async fn unknown_classes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "Odd.yaml", "class: Spreadsheet\ntitle: Odd\n");
        write(root, "Plain.yaml", "title: No class\n");
        write(root, "Docs.yaml", "class: Teamspace\ntitle: Docs\n");
        write(
            root,
            "Docs/1.Bug.md",
            "---\nclass: Issue\ntitle: Bug\nstatus: Todo\n---\n",
        );

        let err = load(root, ImportMode::Strict).await.unwrap_err();
        assert!(matches!(err, ImportError::UnknownClass { .. }));

        let builder = load(root, ImportMode::Lenient).await.unwrap();
        let report = builder.report();
        assert_eq!(report.len(), 2);
        assert!(report
            .iter()
            .all(|(_, err)| matches!(err, ImportError::UnknownClass { .. })));
    }
}
