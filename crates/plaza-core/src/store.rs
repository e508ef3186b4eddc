//! Storage traits for the identity store and the three ledgers.
//!
//! Implemented by storage backends (e.g. `plaza-store-sqlite`). The HTTP
//! layer depends on these traits, never on a concrete backend. Every
//! mutation that touches more than one row (edge plus counter, group plus
//! creator membership) is atomic in any conforming implementation.

use std::future::Future;

use crate::{
  error::Classify,
  feed::{Comment, ContentFilter, ContentItem, Engagement, FeedPage, NewComment, NewPost},
  group::{
    GroupEntity, GroupPatch, GroupView, JoinDecision, MemberFilter, MemberPatch,
    MembershipEdge, NewGroup,
  },
  identity::{NewUser, ProfilePatch, UserIdentity},
  ids::{GroupId, PostId, UserId},
  page::{PageRequest, Paged},
  relationship::{RelationshipAction, RelationshipEdge, RequestDirection},
};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The user accounts every other store refers to by [`UserId`].
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  /// Create a profile. Fails with `UsernameTaken` on a duplicate username.
  fn create_user(
    &self,
    new: NewUser,
  ) -> impl Future<Output = Result<UserIdentity, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<UserIdentity>, Self::Error>> + Send + '_;

  /// Usernames are matched case-insensitively.
  fn get_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<UserIdentity>, Self::Error>> + Send + '_;

  /// Fetch every user in `ids` that exists. Missing ids are skipped.
  fn users_by_ids(
    &self,
    ids: Vec<UserId>,
  ) -> impl Future<Output = Result<Vec<UserIdentity>, Self::Error>> + Send + '_;

  /// Every user, active or not, in id order.
  fn list_users(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<UserIdentity>, Self::Error>> + Send + '_;

  /// Apply `patch` to the user's own profile. The username never changes.
  fn update_profile(
    &self,
    id: UserId,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<UserIdentity, Self::Error>> + Send + '_;

  /// Record the account state reported by the authentication service.
  /// Existing edges and memberships are kept.
  fn set_active(
    &self,
    id: UserId,
    active: bool,
  ) -> impl Future<Output = Result<UserIdentity, Self::Error>> + Send + '_;
}

// ─── Relationships ───────────────────────────────────────────────────────────

pub trait RelationshipStore: IdentityStore {
  /// Apply `action` by `actor` against `target`. Returns the edge after the
  /// change, or `None` when the action deleted it.
  fn perform_action(
    &self,
    actor: UserId,
    target: UserId,
    action: RelationshipAction,
  ) -> impl Future<Output = Result<Option<RelationshipEdge>, Self::Error>> + Send + '_;

  /// The edge between `a` and `b`, in either direction.
  fn edge_between(
    &self,
    a: UserId,
    b: UserId,
  ) -> impl Future<Output = Result<Option<RelationshipEdge>, Self::Error>> + Send + '_;

  /// Accepted edges involving `user`, most recently updated first.
  fn list_accepted(
    &self,
    user: UserId,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<RelationshipEdge>, Self::Error>> + Send + '_;

  /// Number of accepted edges involving `user`.
  fn friend_count(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Pending edges addressed to (incoming) or sent by (outgoing) `user`,
  /// newest first.
  fn list_pending(
    &self,
    user: UserId,
    direction: RequestDirection,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<RelationshipEdge>, Self::Error>> + Send + '_;

  /// Active users other than `user` with no edge of any status to `user`.
  fn suggestion_candidates(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>> + Send + '_;

  /// Number of users that are accepted friends of both `a` and `b`.
  fn mutual_count(
    &self,
    a: UserId,
    b: UserId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Groups ──────────────────────────────────────────────────────────────────

pub trait GroupStore: IdentityStore {
  /// Create a group together with the creator's approved admin membership.
  fn create_group(
    &self,
    creator: UserId,
    new: NewGroup,
  ) -> impl Future<Output = Result<(GroupEntity, MembershipEdge), Self::Error>> + Send + '_;

  fn get_group(
    &self,
    id: GroupId,
  ) -> impl Future<Output = Result<Option<GroupEntity>, Self::Error>> + Send + '_;

  /// The group as `viewer` may see it. Private groups require an approved
  /// membership.
  fn view_group(
    &self,
    viewer: Option<UserId>,
    id: GroupId,
  ) -> impl Future<Output = Result<GroupView, Self::Error>> + Send + '_;

  fn membership(
    &self,
    group: GroupId,
    user: UserId,
  ) -> impl Future<Output = Result<Option<MembershipEdge>, Self::Error>> + Send + '_;

  fn update_group(
    &self,
    actor: UserId,
    id: GroupId,
    patch: GroupPatch,
  ) -> impl Future<Output = Result<GroupEntity, Self::Error>> + Send + '_;

  /// Delete a group and every membership in it.
  fn delete_group(
    &self,
    actor: UserId,
    id: GroupId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Public groups, newest first.
  fn list_groups(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<GroupEntity>, Self::Error>> + Send + '_;

  /// Groups in which `user` holds an approved membership.
  fn list_user_groups(
    &self,
    user: UserId,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<GroupEntity>, Self::Error>> + Send + '_;

  fn join(
    &self,
    user: UserId,
    group: GroupId,
    nickname: Option<String>,
  ) -> impl Future<Output = Result<MembershipEdge, Self::Error>> + Send + '_;

  fn leave(
    &self,
    user: UserId,
    group: GroupId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn invite(
    &self,
    actor: UserId,
    group: GroupId,
    target: UserId,
  ) -> impl Future<Output = Result<MembershipEdge, Self::Error>> + Send + '_;

  /// Approve or reject `target`'s pending membership.
  fn review_join(
    &self,
    actor: UserId,
    group: GroupId,
    target: UserId,
    decision: JoinDecision,
  ) -> impl Future<Output = Result<MembershipEdge, Self::Error>> + Send + '_;

  fn remove_member(
    &self,
    actor: UserId,
    group: GroupId,
    target: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Update membership `member_id` (the membership row, not the user).
  fn update_member(
    &self,
    actor: UserId,
    group: GroupId,
    member_id: i64,
    patch: MemberPatch,
  ) -> impl Future<Output = Result<MembershipEdge, Self::Error>> + Send + '_;

  fn list_members(
    &self,
    viewer: Option<UserId>,
    group: GroupId,
    filter: MemberFilter,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<MembershipEdge>, Self::Error>> + Send + '_;
}

// ─── Content ─────────────────────────────────────────────────────────────────

pub trait ContentStore: IdentityStore {
  fn create_post(
    &self,
    author: UserId,
    new: NewPost,
  ) -> impl Future<Output = Result<ContentItem, Self::Error>> + Send + '_;

  /// A post `viewer` is allowed to see. Hidden and deleted posts are
  /// reported as `PostNotFound`.
  fn get_post(
    &self,
    viewer: Option<UserId>,
    id: PostId,
  ) -> impl Future<Output = Result<ContentItem, Self::Error>> + Send + '_;

  /// Soft-delete a post. Only the author may delete.
  fn delete_post(
    &self,
    actor: UserId,
    id: PostId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Idempotent: liking twice counts once.
  fn like(
    &self,
    user: UserId,
    id: PostId,
  ) -> impl Future<Output = Result<Engagement, Self::Error>> + Send + '_;

  fn unlike(
    &self,
    user: UserId,
    id: PostId,
  ) -> impl Future<Output = Result<Engagement, Self::Error>> + Send + '_;

  fn add_comment(
    &self,
    user: UserId,
    id: PostId,
    new: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Comments oldest first.
  fn list_comments(
    &self,
    viewer: Option<UserId>,
    id: PostId,
    page: PageRequest,
  ) -> impl Future<Output = Result<Paged<Comment>, Self::Error>> + Send + '_;

  fn share(
    &self,
    user: UserId,
    id: PostId,
  ) -> impl Future<Output = Result<Engagement, Self::Error>> + Send + '_;

  /// Every live post matching `filter` with its engagement counts, ordered
  /// `created_at` descending then id descending. This is the snapshot
  /// [`crate::feed::rank`] runs over.
  fn content_snapshot(
    &self,
    filter: ContentFilter,
  ) -> impl Future<Output = Result<Vec<ContentItem>, Self::Error>> + Send + '_;

  /// One page of the posts matching `filter`, newest first, paginated by the
  /// store. Equivalent to ranking the snapshot in a recency mode.
  fn recent_page(
    &self,
    filter: ContentFilter,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<FeedPage<ContentItem>, Self::Error>> + Send + '_;
}
