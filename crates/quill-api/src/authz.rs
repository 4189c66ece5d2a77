use quill_auth::token::Claims;
use quill_db::models::PostRow;

/// Ownership rule: only the author of a post may edit or delete it.
///
/// There is deliberately no role-based override; if one is ever added, the
/// role must live on the user record and be checked here explicitly.
pub fn can_mutate(actor: &Claims, post: &PostRow) -> bool {
    post.author_id == actor.sub.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn claims_for(id: Uuid) -> Claims {
        Claims {
            sub: id,
            username: "alice".to_string(),
            exp: i64::MAX,
        }
    }

    fn post_owned_by(id: Uuid) -> PostRow {
        PostRow {
            id: Uuid::new_v4().to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            author_id: id.to_string(),
            author_username: "alice".to_string(),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn owner_may_mutate() {
        let id = Uuid::new_v4();
        assert!(can_mutate(&claims_for(id), &post_owned_by(id)));
    }

    #[test]
    fn non_owner_never_may() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        assert!(!can_mutate(&claims_for(stranger), &post_owned_by(owner)));
    }
}
