use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MealStatus {
    Planning,
    Completed,
}

impl fmt::Display for MealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for MealStatus {
    type Err = MealStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "completed" => Ok(Self::Completed),
            other => Err(MealStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MealStatus`] string.
#[derive(Debug, Clone)]
pub struct MealStatusParseError(pub String);

impl fmt::Display for MealStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid meal status: {:?}", self.0)
    }
}

impl std::error::Error for MealStatusParseError {}

// ---------------------------------------------------------------------------

/// Role a participant holds within a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Attendee,
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Host => "host",
            Self::Attendee => "attendee",
        };
        f.write_str(s)
    }
}

impl FromStr for ParticipantRole {
    type Err = ParticipantRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "attendee" => Ok(Self::Attendee),
            other => Err(ParticipantRoleParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ParticipantRole`] string.
#[derive(Debug, Clone)]
pub struct ParticipantRoleParseError(pub String);

impl fmt::Display for ParticipantRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid participant role: {:?}", self.0)
    }
}

impl std::error::Error for ParticipantRoleParseError {}

// ---------------------------------------------------------------------------

/// A participant's response to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Pending,
    Accepted,
    Maybe,
    Declined,
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Maybe => "maybe",
            Self::Declined => "declined",
        };
        f.write_str(s)
    }
}

impl FromStr for RsvpStatus {
    type Err = RsvpStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "maybe" => Ok(Self::Maybe),
            "declined" => Ok(Self::Declined),
            other => Err(RsvpStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RsvpStatus`] string.
#[derive(Debug, Clone)]
pub struct RsvpStatusParseError(pub String);

impl fmt::Display for RsvpStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid rsvp status: {:?}", self.0)
    }
}

impl std::error::Error for RsvpStatusParseError {}

// ---------------------------------------------------------------------------

/// Course category of a dish slot.
///
/// Declaration order is serving order, which is also the order the
/// `get_meal_dishes` procedure sorts by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Course {
    Appetizer,
    Salad,
    Main,
    Side,
    Dessert,
    Drink,
    Other,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Appetizer => "appetizer",
            Self::Salad => "salad",
            Self::Main => "main",
            Self::Side => "side",
            Self::Dessert => "dessert",
            Self::Drink => "drink",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for Course {
    type Err = CourseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appetizer" => Ok(Self::Appetizer),
            "salad" => Ok(Self::Salad),
            "main" => Ok(Self::Main),
            "side" => Ok(Self::Side),
            "dessert" => Ok(Self::Dessert),
            "drink" => Ok(Self::Drink),
            "other" => Ok(Self::Other),
            other => Err(CourseParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Course`] string.
#[derive(Debug, Clone)]
pub struct CourseParseError(pub String);

impl fmt::Display for CourseParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid course: {:?}", self.0)
    }
}

impl std::error::Error for CourseParseError {}

// ---------------------------------------------------------------------------

/// Kind of a feed post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Meal,
    Dish,
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Meal => "meal",
            Self::Dish => "dish",
        };
        f.write_str(s)
    }
}

impl FromStr for PostKind {
    type Err = PostKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meal" => Ok(Self::Meal),
            "dish" => Ok(Self::Dish),
            other => Err(PostKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PostKind`] string.
#[derive(Debug, Clone)]
pub struct PostKindParseError(pub String);

impl fmt::Display for PostKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid post kind: {:?}", self.0)
    }
}

impl std::error::Error for PostKindParseError {}

// ---------------------------------------------------------------------------

/// Kind of association between two posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    SameMeal,
    PairedDish,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SameMeal => "same_meal",
            Self::PairedDish => "paired_dish",
        };
        f.write_str(s)
    }
}

impl FromStr for RelationshipKind {
    type Err = RelationshipKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_meal" => Ok(Self::SameMeal),
            "paired_dish" => Ok(Self::PairedDish),
            other => Err(RelationshipKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RelationshipKind`] string.
#[derive(Debug, Clone)]
pub struct RelationshipKindParseError(pub String);

impl fmt::Display for RelationshipKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid relationship kind: {:?}", self.0)
    }
}

impl std::error::Error for RelationshipKindParseError {}

// ---------------------------------------------------------------------------

/// Display status of a plan item.
///
/// Never stored: always derived from which nullable columns of the
/// `plan_items` row are populated (see [`PlanItem::status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemStatus {
    Unclaimed,
    Assigned,
    Claimed,
    HasRecipe,
    Completed,
}

impl fmt::Display for PlanItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unclaimed => "unclaimed",
            Self::Assigned => "assigned",
            Self::Claimed => "claimed",
            Self::HasRecipe => "has_recipe",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanItemStatus {
    type Err = PlanItemStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unclaimed" => Ok(Self::Unclaimed),
            "assigned" => Ok(Self::Assigned),
            "claimed" => Ok(Self::Claimed),
            "has_recipe" => Ok(Self::HasRecipe),
            "completed" => Ok(Self::Completed),
            other => Err(PlanItemStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanItemStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanItemStatusParseError(pub String);

impl fmt::Display for PlanItemStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan item status: {:?}", self.0)
    }
}

impl std::error::Error for PlanItemStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A user profile. Only the display name is needed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A meal -- the top-level planning aggregate.
///
/// The owning host is not a column: it is whichever participant currently
/// holds the `host` role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: MealStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Membership of one user in one meal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub meal_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub rsvp_status: RsvpStatus,
    pub invited_by: Option<Uuid>,
    pub invited_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// True for the participant holding the host role with an accepted RSVP.
    pub fn is_accepted_host(&self) -> bool {
        self.role == ParticipantRole::Host && self.rsvp_status == RsvpStatus::Accepted
    }
}

/// A dish slot within a meal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanItem {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub course: Course,
    pub name: Option<String>,
    pub is_main_dish: bool,
    pub assigned_to: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub recipe_id: Option<Uuid>,
    pub dish_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl PlanItem {
    /// Derive the display status from the populated columns.
    ///
    /// Precedence: dish, then recipe, then claim, then assignment.
    pub fn status(&self) -> PlanItemStatus {
        if self.dish_id.is_some() {
            PlanItemStatus::Completed
        } else if self.recipe_id.is_some() {
            PlanItemStatus::HasRecipe
        } else if self.claimed_by.is_some() {
            PlanItemStatus::Claimed
        } else if self.assigned_to.is_some() {
            PlanItemStatus::Assigned
        } else {
            PlanItemStatus::Unclaimed
        }
    }

    /// Label used in listings: the slot name, or the course when unnamed.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.course.to_string(),
        }
    }
}

/// A recipe a claimer can attach to a slot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A feed post: either a published meal or a cooked dish.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub kind: PostKind,
    pub meal_id: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An undirected edge between two posts. Stored with `post_a < post_b`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostRelationship {
    pub id: Uuid,
    pub post_a: Uuid,
    pub post_b: Uuid,
    pub kind: RelationshipKind,
    pub created_at: DateTime<Utc>,
}

impl PostRelationship {
    /// Order a pair the way the `post_relationships` table stores it.
    pub fn normalize(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn touches(&self, post_id: Uuid) -> bool {
        self.post_a == post_id || self.post_b == post_id
    }
}

/// Row returned by the `get_meal_dishes` procedure.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealDish {
    pub plan_item_id: Uuid,
    pub course: Course,
    pub name: Option<String>,
    pub is_main_dish: bool,
    pub claimed_by: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    pub recipe_title: Option<String>,
    pub dish_id: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row returned by the `get_meal_participants` procedure.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParticipantProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: ParticipantRole,
    pub rsvp_status: RsvpStatus,
    pub invited_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Slot work taken back from a member who left or stopped attending.
/// Completed slots are never touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedSlots {
    pub released_claims: u64,
    pub cleared_assignments: u64,
}

impl ReleasedSlots {
    pub fn is_empty(&self) -> bool {
        self.released_claims == 0 && self.cleared_assignments == 0
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fields supplied when creating a meal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeal {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

/// Partial update of a meal's descriptive fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl MealChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.scheduled_at.is_none()
    }
}

/// Specification of a single dish slot to add to a meal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlanItem {
    pub course: Course,
    pub name: Option<String>,
    #[serde(default)]
    pub is_main_dish: bool,
    pub assigned_to: Option<Uuid>,
}

impl NewPlanItem {
    pub fn course(course: Course) -> Self {
        Self {
            course,
            name: None,
            is_main_dish: false,
            assigned_to: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_item() -> PlanItem {
        PlanItem {
            id: Uuid::new_v4(),
            meal_id: Uuid::new_v4(),
            course: Course::Main,
            name: None,
            is_main_dish: false,
            assigned_to: None,
            assigned_at: None,
            claimed_by: None,
            claimed_at: None,
            recipe_id: None,
            dish_id: None,
            completed_at: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rsvp_status_parses_all_variants() {
        for s in ["pending", "accepted", "maybe", "declined"] {
            let parsed: RsvpStatus = s.parse().expect("should parse");
            assert_eq!(parsed.to_string(), s);
        }
        assert!("attending".parse::<RsvpStatus>().is_err());
    }

    #[test]
    fn course_order_follows_serving_order() {
        let mut courses = vec![Course::Dessert, Course::Main, Course::Appetizer, Course::Side];
        courses.sort();
        assert_eq!(
            courses,
            vec![Course::Appetizer, Course::Main, Course::Side, Course::Dessert]
        );
    }

    #[test]
    fn course_invalid() {
        assert!("brunch".parse::<Course>().is_err());
    }

    #[test]
    fn relationship_kind_uses_snake_case() {
        assert_eq!(RelationshipKind::PairedDish.to_string(), "paired_dish");
        assert_eq!(
            "same_meal".parse::<RelationshipKind>().unwrap(),
            RelationshipKind::SameMeal
        );
    }

    #[test]
    fn status_precedence() {
        let mut item = blank_item();
        assert_eq!(item.status(), PlanItemStatus::Unclaimed);

        item.assigned_to = Some(Uuid::new_v4());
        assert_eq!(item.status(), PlanItemStatus::Assigned);

        item.claimed_by = Some(Uuid::new_v4());
        assert_eq!(item.status(), PlanItemStatus::Claimed);

        item.recipe_id = Some(Uuid::new_v4());
        assert_eq!(item.status(), PlanItemStatus::HasRecipe);

        item.dish_id = Some(Uuid::new_v4());
        assert_eq!(item.status(), PlanItemStatus::Completed);
    }

    #[test]
    fn self_claim_without_assignment_is_claimed() {
        let mut item = blank_item();
        item.claimed_by = Some(Uuid::new_v4());
        assert_eq!(item.status(), PlanItemStatus::Claimed);
    }

    #[test]
    fn label_falls_back_to_course() {
        let mut item = blank_item();
        assert_eq!(item.label(), "main");
        item.name = Some("Lasagna".to_owned());
        assert_eq!(item.label(), "Lasagna");
    }

    #[test]
    fn relationship_normalize_orders_pair() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        assert_eq!(PostRelationship::normalize(a, b), (b, a));
        assert_eq!(PostRelationship::normalize(b, a), (b, a));
    }

    #[test]
    fn meal_changes_empty() {
        assert!(MealChanges::default().is_empty());
        let changes = MealChanges {
            location: Some("Backyard".to_owned()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
