/// Counter reconciler - keeps post.comments_count consistent under
/// concurrent comment mutation
///
/// All counter mutation happens inside the caller's transaction, behind an
/// exclusive lock on the single post row. The delta is always re-derived from
/// the operation that just occurred; the stored value is never read as a
/// cache. Two concurrent creates on the same post serialize on the row lock,
/// so neither increment is lost.
use crate::error::Result;
use sqlx::PgConnection;
use tracing::warn;

/// How many times a mutating transaction is re-run from scratch when the
/// store reports a serialization failure or deadlock.
pub const MAX_ATTEMPTS: u32 = 3;

/// Apply a signed delta to a post's comments_count, clamped at zero.
///
/// Takes `FOR UPDATE` on the post row before the read-modify-write and holds
/// it until the surrounding transaction commits. A missing post surfaces as
/// `NotFound`.
pub async fn adjust(conn: &mut PgConnection, post_id: i64, delta: i64) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }

    let current: i32 = sqlx::query_scalar("SELECT comments_count FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;

    let mut next = i64::from(current) + delta;
    if next < 0 {
        // An undershoot means a past update was lost somewhere; clamp and
        // log rather than crash the request.
        warn!(
            post_id,
            current, delta, "comments_count would go negative; clamping to 0"
        );
        next = 0;
    }

    sqlx::query("UPDATE posts SET comments_count = $1, updated_at = NOW() WHERE id = $2")
        .bind(next as i32)
        .bind(post_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn increment(conn: &mut PgConnection, post_id: i64, delta: i64) -> Result<()> {
    adjust(conn, post_id, delta).await
}

pub async fn decrement(conn: &mut PgConnection, post_id: i64, delta: i64) -> Result<()> {
    adjust(conn, post_id, -delta).await
}

/// How much a create contributes to the counter: top-level comments always
/// count, replies only under the count-replies policy.
pub fn created_delta(top_level_created: u64, replies_created: u64, count_replies: bool) -> i64 {
    if count_replies {
        (top_level_created + replies_created) as i64
    } else {
        top_level_created as i64
    }
}

/// How much a cascade removal takes off the counter: 1 when the removed root
/// was top-level, or the whole subtree under the count-replies policy.
pub fn removed_delta(root_was_top_level: bool, rows_removed: u64, count_replies: bool) -> i64 {
    if count_replies {
        rows_removed as i64
    } else if root_was_top_level {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_only_policy_counts_roots() {
        assert_eq!(created_delta(1, 0, false), 1);
        assert_eq!(created_delta(1, 4, false), 1);
        assert_eq!(created_delta(0, 3, false), 0);
    }

    #[test]
    fn count_replies_policy_counts_everything() {
        assert_eq!(created_delta(1, 4, true), 5);
        assert_eq!(created_delta(0, 3, true), 3);
    }

    #[test]
    fn removing_a_top_level_subtree_decrements_by_one() {
        // a root with K descendants removes 1+K rows but only 1 counts
        assert_eq!(removed_delta(true, 5, false), 1);
        assert_eq!(removed_delta(true, 1, false), 1);
    }

    #[test]
    fn removing_a_reply_subtree_does_not_touch_the_counter() {
        assert_eq!(removed_delta(false, 3, false), 0);
    }

    #[test]
    fn removal_under_count_replies_policy_uses_row_count() {
        assert_eq!(removed_delta(true, 5, true), 5);
        assert_eq!(removed_delta(false, 3, true), 3);
    }
}
