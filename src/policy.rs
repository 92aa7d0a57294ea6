use crate::article::Article;
use crate::comment::Comment;
use crate::types::ApiError;

/// Something with an author.
pub trait Owned {
    fn owner_id(&self) -> i32;
}

impl Owned for Article {
    fn owner_id(&self) -> i32 {
        self.author_id
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> i32 {
        self.user_id
    }
}

pub fn is_owner<T: Owned>(entity: &T, principal: i32) -> bool {
    entity.owner_id() == principal
}

pub fn ensure_owner<T: Owned>(entity: &T, principal: i32) -> Result<(), ApiError> {
    if is_owner(entity, principal) {
        Ok(())
    } else {
        Err(ApiError::NotOwner)
    }
}

/// The comment must hang off the article the request named.
pub fn ensure_contained(comment: &Comment, article_id: i32) -> Result<(), ApiError> {
    if comment.article_id == article_id {
        Ok(())
    } else {
        Err(ApiError::NotContained)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAction {
    Follow,
    Unfollow,
}

pub fn ensure_not_self(principal: i32, target: i32, action: EdgeAction) -> Result<(), ApiError> {
    if principal != target {
        return Ok(());
    }
    Err(ApiError::SelfAction(match action {
        EdgeAction::Follow => "cannot follow self",
        EdgeAction::Unfollow => "cannot unfollow self",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn ownership() {
        let article = testing::article(1, 1);
        assert!(ensure_owner(&article, 1).is_ok());
        assert!(matches!(ensure_owner(&article, 2), Err(ApiError::NotOwner)));

        let comment = testing::comment(1, 1, 2);
        assert!(is_owner(&comment, 2));
        assert!(matches!(ensure_owner(&comment, 1), Err(ApiError::NotOwner)));
    }

    #[test]
    fn containment() {
        let comment = testing::comment(1, 2, 1);
        assert!(ensure_contained(&comment, 2).is_ok());
        let err = ensure_contained(&comment, 1).unwrap_err();
        assert_eq!(err.message(), "the comment is not in the article");
    }

    #[test]
    fn self_edges() {
        assert!(ensure_not_self(1, 2, EdgeAction::Follow).is_ok());
        let err = ensure_not_self(3, 3, EdgeAction::Follow).unwrap_err();
        assert_eq!(err.message(), "cannot follow self");
        let err = ensure_not_self(3, 3, EdgeAction::Unfollow).unwrap_err();
        assert_eq!(err.message(), "cannot unfollow self");
    }
}
