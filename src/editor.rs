//! Builder edit controller: selection, keyboard nudging, field edits and the
//! save handoff for one floor-plan under construction.

use tracing::{debug, info};

use crate::config::{BuildConfig, EditorConfig};
use crate::geometry::{degrees_to_radians, wrap_radians, Axis};
use crate::model::{ObjectId, ObjectKind, ObjectModel, ObjectPatch, SpatialObject};
use crate::store::{FloorPlanKey, FloorPlanStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EditorError {
    /// Whether the failure should be shown to the user as a correctable input problem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EditorError::Validation(_)
                | EditorError::Store(StoreError::AlreadyExists(_) | StoreError::InvalidKey(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Space,
    Backspace,
    Other(String),
}

/// A key press as seen by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    /// Fine-adjust modifier held.
    pub fine: bool,
    /// A text field has focus; the builder must not steal the key.
    pub text_input_focused: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            fine: false,
            text_input_focused: false,
        }
    }

    pub fn fine(mut self) -> Self {
        self.fine = true;
        self
    }
}

/// A direct overwrite from the property panel.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Position(Axis, f32),
    Size(Axis, f32),
    /// Y rotation in degrees.
    RotationDegrees(f32),
    Name(String),
    ZoneEquipment {
        extinguisher: Option<bool>,
        stair: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveTarget {
    /// Store as a new floor-plan; fails if the key is taken.
    Create(FloorPlanKey),
    /// Overwrite an existing floor-plan.
    Update(FloorPlanKey),
}

impl SaveTarget {
    pub fn key(&self) -> &FloorPlanKey {
        match self {
            SaveTarget::Create(key) | SaveTarget::Update(key) => key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuilderEditor {
    model: ObjectModel,
    selected: Option<ObjectId>,
    pending_kind: ObjectKind,
    config: EditorConfig,
}

impl BuilderEditor {
    pub fn new(build: BuildConfig, config: EditorConfig) -> Self {
        Self::with_model(ObjectModel::new(build), config)
    }

    /// Opens an existing floor-plan for editing.
    pub fn with_model(model: ObjectModel, config: EditorConfig) -> Self {
        Self {
            model,
            selected: None,
            pending_kind: ObjectKind::Wall,
            config,
        }
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    pub fn into_model(self) -> ObjectModel {
        self.model
    }

    pub fn pending_kind(&self) -> ObjectKind {
        self.pending_kind
    }

    pub fn set_pending_kind(&mut self, kind: ObjectKind) {
        self.pending_kind = kind;
    }

    pub fn selected_id(&self) -> Option<&ObjectId> {
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&SpatialObject> {
        self.selected.as_ref().and_then(|id| self.model.get(id))
    }

    /// Listing label of an object, e.g. `"Zone: 201"` or `"Wall"`.
    pub fn kind_label(object: &SpatialObject) -> String {
        match object.display_name() {
            Some(name) => format!("{}: {name}", object.kind().label()),
            None => object.kind().label().to_string(),
        }
    }

    /// Adds a default object of the pending kind and selects it.
    pub fn add(&mut self) -> ObjectId {
        let id = self.model.add(self.pending_kind).id.clone();
        self.selected = Some(id.clone());
        id
    }

    /// Scene click: toggles the selection of `id`.
    pub fn click(&mut self, id: &ObjectId) {
        if !self.model.contains(id) {
            return;
        }
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        } else {
            self.selected = Some(id.clone());
        }
    }

    /// List click: always selects.
    pub fn select_from_list(&mut self, id: &ObjectId) {
        if self.model.contains(id) {
            self.selected = Some(id.clone());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Removes the selected object. No-op without a selection.
    pub fn delete(&mut self) -> Option<SpatialObject> {
        let id = self.selected.take()?;
        self.model.remove(&id)
    }

    /// Applies a keyboard transform to the selection. Returns whether anything
    /// changed.
    pub fn handle_key(&mut self, input: &KeyInput) -> bool {
        if input.text_input_focused {
            return false;
        }
        let Some(object) = self.selected() else {
            return false;
        };

        let step = self.config.move_amount(input.fine);
        let patch = match input.key {
            Key::Left => ObjectPatch {
                position: Some(object.position.nudged(Axis::X, -step)),
                ..ObjectPatch::default()
            },
            Key::Right => ObjectPatch {
                position: Some(object.position.nudged(Axis::X, step)),
                ..ObjectPatch::default()
            },
            Key::Up => ObjectPatch {
                position: Some(object.position.nudged(Axis::Z, -step)),
                ..ObjectPatch::default()
            },
            Key::Down => ObjectPatch {
                position: Some(object.position.nudged(Axis::Z, step)),
                ..ObjectPatch::default()
            },
            Key::Space => {
                let y = wrap_radians(object.rotation.y() + self.config.rotate_amount(input.fine));
                ObjectPatch {
                    rotation: Some(object.rotation.with(Axis::Y, y)),
                    ..ObjectPatch::default()
                }
            }
            Key::Backspace => return self.delete().is_some(),
            Key::Other(_) => return false,
        };

        let id = object.id.clone();
        debug!(%id, key = ?input.key, fine = input.fine, "keyboard transform");
        self.model.patch(&id, patch)
    }

    /// Overwrites one field of the selection. Returns whether a selection existed.
    pub fn edit_field(&mut self, edit: FieldEdit) -> bool {
        let Some(object) = self.selected() else {
            return false;
        };

        let patch = match edit {
            FieldEdit::Position(axis, value) => ObjectPatch {
                position: Some(object.position.with(axis, value)),
                ..ObjectPatch::default()
            },
            FieldEdit::Size(axis, value) => ObjectPatch {
                size: Some(object.size.with(axis, value)),
                ..ObjectPatch::default()
            },
            FieldEdit::RotationDegrees(degrees) => ObjectPatch {
                rotation: Some(object.rotation.with(Axis::Y, degrees_to_radians(degrees))),
                ..ObjectPatch::default()
            },
            FieldEdit::Name(name) => ObjectPatch {
                name: Some(name),
                ..ObjectPatch::default()
            },
            FieldEdit::ZoneEquipment {
                extinguisher,
                stair,
            } => ObjectPatch {
                extinguisher,
                stair,
                ..ObjectPatch::default()
            },
        };

        let id = object.id.clone();
        self.model.patch(&id, patch)
    }

    /// Hands the full object list to `store`. Local state is never modified.
    pub async fn save(
        &self,
        store: &dyn FloorPlanStore,
        target: &SaveTarget,
    ) -> Result<(), EditorError> {
        let key = target.key();
        if key.building_name.trim().is_empty() {
            return Err(EditorError::Validation(
                "building name must not be empty".to_string(),
            ));
        }

        let objects = self.model.to_vec();
        match target {
            SaveTarget::Create(key) => store.create(key, objects).await?,
            SaveTarget::Update(key) => store.update(key, objects).await?,
        }

        info!(
            building = %key.building_name,
            floor = key.floor,
            objects = self.model.len(),
            "floor-plan saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::geometry::{radians_to_degrees, Vector3D};
    use crate::store::SledFloorPlanStore;

    fn editor() -> BuilderEditor {
        BuilderEditor::new(BuildConfig::default(), EditorConfig::default())
    }

    fn temp_store() -> SledFloorPlanStore {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        SledFloorPlanStore::from_db(db).expect("failed to open floor-plan tree")
    }

    #[test]
    fn add_selects_new_object_of_pending_kind() {
        let mut editor = editor();
        editor.set_pending_kind(ObjectKind::Zone);
        let id = editor.add();

        assert_eq!(editor.selected_id(), Some(&id));
        assert_eq!(editor.selected().map(SpatialObject::kind), Some(ObjectKind::Zone));
    }

    #[test]
    fn click_toggles_single_selection() {
        let mut editor = editor();
        let a = editor.add();
        let b = editor.add();

        editor.click(&a);
        assert_eq!(editor.selected_id(), Some(&a));
        editor.click(&b);
        assert_eq!(editor.selected_id(), Some(&b));
        editor.click(&b);
        assert_eq!(editor.selected_id(), None);

        editor.select_from_list(&a);
        editor.select_from_list(&a);
        assert_eq!(editor.selected_id(), Some(&a));
    }

    #[test]
    fn right_arrow_moves_along_x() {
        let mut editor = editor();
        editor.add();
        assert_eq!(editor.selected().map(|o| o.position), Some(Vector3D::new(0.0, 0.35, 0.0)));

        assert!(editor.handle_key(&KeyInput::new(Key::Right)));
        let position = editor.selected().expect("selection").position;
        assert!(position.approx_eq(&Vector3D::new(0.1, 0.35, 0.0), 1e-6));
    }

    #[test]
    fn arrows_change_exactly_one_field() {
        let mut editor = editor();
        editor.add();

        editor.handle_key(&KeyInput::new(Key::Up));
        let position = editor.selected().expect("selection").position;
        assert!(position.approx_eq(&Vector3D::new(0.0, 0.35, -0.1), 1e-6));

        editor.handle_key(&KeyInput::new(Key::Down).fine());
        editor.handle_key(&KeyInput::new(Key::Left).fine());
        let object = editor.selected().expect("selection");
        assert!(object.position.approx_eq(&Vector3D::new(-0.05, 0.35, -0.05), 1e-6));
        assert_eq!(object.rotation, Vector3D::zero());
    }

    #[test]
    fn rotation_wraps_past_full_turn() {
        let mut editor = editor();
        editor.add();
        editor.edit_field(FieldEdit::RotationDegrees(350.0));

        editor.handle_key(&KeyInput::new(Key::Space));
        let y = editor.selected().expect("selection").rotation.y();
        assert!((radians_to_degrees(y) - 35.0).abs() < 1e-3);
        assert!((0.0..2.0 * PI).contains(&y));
    }

    #[test]
    fn fine_rotation_uses_five_degrees() {
        let mut editor = editor();
        editor.add();
        editor.handle_key(&KeyInput::new(Key::Space).fine());
        let y = editor.selected().expect("selection").rotation.y();
        assert!((y - PI / 36.0).abs() < 1e-6);
    }

    #[test]
    fn keys_are_ignored_without_selection_or_with_text_focus() {
        let mut editor = editor();
        editor.add();
        let before = editor.model().to_vec();

        let focused = KeyInput {
            key: Key::Right,
            fine: false,
            text_input_focused: true,
        };
        assert!(!editor.handle_key(&focused));
        assert!(!editor.handle_key(&KeyInput::new(Key::Other("a".to_string()))));
        assert_eq!(editor.model().list(), before.as_slice());

        editor.clear_selection();
        assert!(!editor.handle_key(&KeyInput::new(Key::Right)));
        assert!(!editor.handle_key(&KeyInput::new(Key::Backspace)));
        assert_eq!(editor.model().len(), 1);
    }

    #[test]
    fn backspace_deletes_and_clears_selection() {
        let mut editor = editor();
        editor.add();
        assert!(editor.handle_key(&KeyInput::new(Key::Backspace)));
        assert!(editor.model().is_empty());
        assert_eq!(editor.selected_id(), None);
        assert!(editor.delete().is_none());
    }

    #[test]
    fn field_edits_overwrite_selected_object() {
        let mut editor = editor();
        editor.set_pending_kind(ObjectKind::Zone);
        editor.add();

        editor.edit_field(FieldEdit::Position(Axis::Z, 1.875));
        editor.edit_field(FieldEdit::Size(Axis::X, 1.9));
        editor.edit_field(FieldEdit::Name("202".to_string()));
        editor.edit_field(FieldEdit::ZoneEquipment {
            extinguisher: Some(true),
            stair: None,
        });

        let object = editor.selected().expect("selection");
        assert_eq!(object.position.z(), 1.875);
        assert_eq!(object.size.x(), 1.9);
        assert_eq!(BuilderEditor::kind_label(object), "Zone: 202");
        let zone = object.zone().expect("zone");
        assert!(zone.extinguisher);
        assert!(!zone.stair);
    }

    #[test]
    fn unnamed_objects_are_listed_by_kind() {
        let mut editor = editor();
        editor.set_pending_kind(ObjectKind::Firehydrant);
        editor.add();
        let object = editor.selected().expect("selection");
        assert_eq!(BuilderEditor::kind_label(object), "Fire hydrant");
    }

    #[tokio::test]
    async fn save_rejects_empty_building_name() {
        let store = temp_store();
        let mut editor = editor();
        editor.add();
        let before = editor.model().to_vec();

        let err = editor
            .save(&store, &SaveTarget::Create(FloorPlanKey::new("  ", 2)))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(editor.model().list(), before.as_slice());
        assert!(store.list_buildings().await.expect("buildings").is_empty());
    }

    #[tokio::test]
    async fn save_creates_then_updates() {
        let store = temp_store();
        let key = FloorPlanKey::new("Main", 2);
        let mut editor = editor();
        editor.add();

        editor
            .save(&store, &SaveTarget::Create(key.clone()))
            .await
            .expect("create");
        let duplicate = editor.save(&store, &SaveTarget::Create(key.clone())).await;
        assert!(matches!(duplicate, Err(ref e) if e.is_validation()));

        editor.set_pending_kind(ObjectKind::Zone);
        editor.add();
        editor
            .save(&store, &SaveTarget::Update(key.clone()))
            .await
            .expect("update");

        let stored = store.read(&key).await.expect("read").expect("plan");
        assert_eq!(stored.objects, editor.model().to_vec());
    }
}
