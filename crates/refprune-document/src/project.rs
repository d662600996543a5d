//! Project-file queries (item groups and reference entries)
//!
//! An entry in a project file looks like:
//!
//! ```xml
//! <ItemGroup>
//!   <Reference Include="CsvHelper">
//!     <HintPath>..\packages\CsvHelper.2.7.0\lib\net40-client\CsvHelper.dll</HintPath>
//!   </Reference>
//! </ItemGroup>
//! ```
//!
//! Entries are identified by their `Include` value; groups by their position
//! in the document's list of item groups.

use crate::document::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ITEM_GROUP: &str = "ItemGroup";
pub const INCLUDE: &str = "Include";
pub const HINT_PATH: &str = "HintPath";

/// Category of a reference group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Assembly/library reference (`<Reference>`)
    Reference,
    /// Reference to another project file (`<ProjectReference>`)
    ProjectReference,
}

impl ReferenceKind {
    /// Element name used in project files
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::Reference => "Reference",
            Self::ProjectReference => "ProjectReference",
        }
    }

    /// All kinds, in pruning order
    pub fn all() -> [ReferenceKind; 2] {
        [Self::Reference, Self::ProjectReference]
    }

    /// Parse from an element name
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|kind| kind.element_name() == name)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// All item groups, in document order, at any depth
pub fn item_groups(doc: &Document) -> Vec<NodeId> {
    doc.find_all(ITEM_GROUP)
}

/// Category of a group, taken from its first element child
pub fn group_kind(doc: &Document, group: NodeId) -> Option<ReferenceKind> {
    let first = doc.children(group).into_iter().next()?;
    ReferenceKind::from_element_name(doc.name(first))
}

/// Positions (into [`item_groups`]) of the groups holding `kind` entries
///
/// Positions stay valid across reloads as long as only entries are removed.
pub fn group_positions(doc: &Document, kind: ReferenceKind) -> Vec<usize> {
    item_groups(doc)
        .into_iter()
        .enumerate()
        .filter(|&(_, group)| group_kind(doc, group) == Some(kind))
        .map(|(position, _)| position)
        .collect()
}

/// The item group at `position`, if there still is one
pub fn group_at(doc: &Document, position: usize) -> Option<NodeId> {
    item_groups(doc).get(position).copied()
}

/// `Include` names of the group's entries, in document order
pub fn entry_names(doc: &Document, group: NodeId) -> Vec<String> {
    doc.children(group)
        .into_iter()
        .filter_map(|entry| doc.attribute(entry, INCLUDE).map(str::to_string))
        .collect()
}

/// Locate an entry by its `Include` name
pub fn find_entry(doc: &Document, group: NodeId, name: &str) -> Option<NodeId> {
    doc.children(group)
        .into_iter()
        .find(|&entry| doc.attribute(entry, INCLUDE) == Some(name))
}

/// The entry's `HintPath`, if it has a non-empty one
pub fn hint_path(doc: &Document, entry: NodeId) -> Option<String> {
    doc.child_text(entry, HINT_PATH)
        .filter(|hint| !hint.is_empty())
        .map(str::to_string)
}

/// Hint paths of every attached reference entry in the document
pub fn hint_paths(doc: &Document) -> Vec<String> {
    ReferenceKind::all()
        .into_iter()
        .flat_map(|kind| doc.find_all(kind.element_name()))
        .filter_map(|entry| hint_path(doc, entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROJECT: &str = r#"<Project>
  <PropertyGroup><OutputType>Library</OutputType></PropertyGroup>
  <ItemGroup>
    <Compile Include="Class1.cs" />
  </ItemGroup>
  <ItemGroup />
  <ItemGroup>
    <Reference Include="System" />
    <Reference Include="Newtonsoft.Json">
      <HintPath>..\packages\Newtonsoft.Json.9.0.1\lib\net45\Newtonsoft.Json.dll</HintPath>
    </Reference>
  </ItemGroup>
  <ItemGroup>
    <ProjectReference Include="..\Core\Core.csproj">
      <Project>{11111111-2222-3333-4444-555555555555}</Project>
    </ProjectReference>
  </ItemGroup>
</Project>"#;

    #[test]
    fn test_group_positions_skip_empty_and_other_groups() {
        let doc = Document::from_str(PROJECT).unwrap();
        assert_eq!(item_groups(&doc).len(), 4);
        assert_eq!(group_positions(&doc, ReferenceKind::Reference), vec![2]);
        assert_eq!(group_positions(&doc, ReferenceKind::ProjectReference), vec![3]);
    }

    #[test]
    fn test_entry_names_and_lookup() {
        let doc = Document::from_str(PROJECT).unwrap();
        let group = group_at(&doc, 2).unwrap();
        assert_eq!(entry_names(&doc, group), vec!["System", "Newtonsoft.Json"]);

        let entry = find_entry(&doc, group, "Newtonsoft.Json").unwrap();
        assert_eq!(
            hint_path(&doc, entry).as_deref(),
            Some(r"..\packages\Newtonsoft.Json.9.0.1\lib\net45\Newtonsoft.Json.dll")
        );
        assert!(find_entry(&doc, group, "Missing").is_none());
    }

    #[test]
    fn test_hint_paths_skip_removed_entries() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        assert_eq!(hint_paths(&doc).len(), 1);

        let group = group_at(&doc, 2).unwrap();
        let entry = find_entry(&doc, group, "Newtonsoft.Json").unwrap();
        doc.remove(entry);
        assert!(hint_paths(&doc).is_empty());
    }

    #[test]
    fn test_positions_stable_after_emptying_group() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let group = group_at(&doc, 3).unwrap();
        let entry = find_entry(&doc, group, r"..\Core\Core.csproj").unwrap();
        doc.remove(entry);

        let reloaded = Document::from_str(&doc.to_string()).unwrap();
        assert_eq!(item_groups(&reloaded).len(), 4);
        assert!(group_kind(&reloaded, group_at(&reloaded, 3).unwrap()).is_none());
    }

    #[test]
    fn test_reference_kind_names() {
        assert_eq!(ReferenceKind::Reference.to_string(), "Reference");
        assert_eq!(
            ReferenceKind::from_element_name("ProjectReference"),
            Some(ReferenceKind::ProjectReference)
        );
        assert_eq!(ReferenceKind::from_element_name("Compile"), None);
    }
}
