//! Member records and the bridge from caller identity to member

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, MemberQuery, NewMember, UpdateMember},
        Caller,
    },
    repository::Repository,
};

/// Check a record owned by `member_id` against a caller scope
pub fn ensure_owner(scope: Option<i32>, member_id: i32) -> AppResult<()> {
    match scope {
        Some(me) if me != member_id => Err(AppError::NotAuthorized(
            "This record belongs to another member".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Member for `email`, created on first sight.
    ///
    /// Concurrent first calls for the same email race on the unique email
    /// constraint; the loser re-reads the winner's row.
    pub async fn get_or_create_by_email(&self, email: &str) -> AppResult<Member> {
        if let Some(member) = self.repository.find_member_by_email(email).await? {
            return Ok(member);
        }

        let candidate = NewMember::from_email(email, Utc::now());
        if let Some(member) = self.repository.insert_member_if_absent(&candidate).await? {
            tracing::info!("Provisioned member id={} for {}", member.id, email);
            return Ok(member);
        }

        self.repository
            .find_member_by_email(email)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Member for {} vanished after insert", email)))
    }

    /// Member record behind the caller
    pub async fn resolve(&self, caller: &Caller) -> AppResult<Member> {
        self.get_or_create_by_email(&caller.email).await
    }

    /// Member an operation acts for.
    ///
    /// Admins may name any member; everyone else acts for themselves and
    /// may only name their own id.
    pub async fn acting_member_id(&self, caller: &Caller, requested: Option<i32>) -> AppResult<i32> {
        if let (true, Some(id)) = (caller.is_admin(), requested) {
            return Ok(id);
        }

        let me = self.resolve(caller).await?;
        match requested {
            Some(id) if id != me.id => Err(AppError::NotAuthorized(
                "Cannot act on behalf of another member".to_string(),
            )),
            _ => Ok(me.id),
        }
    }

    /// Records the caller may touch: `None` for admins, otherwise their
    /// own member id
    pub async fn scope(&self, caller: &Caller) -> AppResult<Option<i32>> {
        if caller.is_admin() {
            Ok(None)
        } else {
            Ok(Some(self.resolve(caller).await?.id))
        }
    }

    /// Ok when the caller is an admin or is `member_id`
    pub async fn authorize(&self, caller: &Caller, member_id: i32) -> AppResult<()> {
        ensure_owner(self.scope(caller).await?, member_id)
    }

    pub async fn get(&self, caller: &Caller, id: i32) -> AppResult<Member> {
        self.authorize(caller, id).await?;
        self.repository
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    pub async fn search(&self, caller: &Caller, query: &MemberQuery) -> AppResult<Vec<Member>> {
        caller.require_admin()?;
        self.repository.list_members(query).await
    }

    pub async fn create(&self, caller: &Caller, request: CreateMember) -> AppResult<Member> {
        caller.require_admin()?;
        request.validate()?;

        let member = NewMember {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            membership_date: request.membership_date.unwrap_or_else(Utc::now),
        };
        let created = self.repository.insert_member(&member).await?;
        tracing::info!("Member created: id={} <{}>", created.id, created.email);
        Ok(created)
    }

    pub async fn update(&self, caller: &Caller, id: i32, request: UpdateMember) -> AppResult<Member> {
        caller.require_admin()?;
        request.validate()?;

        let current = self
            .repository
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;
        self.repository.update_member(&request.apply(&current)).await
    }

    /// Delete a member along with their loans, fines and reservations.
    /// Copies still out on their active loans go back on the shelf.
    pub async fn delete(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;

        let mut tx = self.repository.begin().await?;
        if tx.lock_member(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }

        let active = tx.lock_active_loans(id).await?;
        for loan in &active {
            if let Some(book) = tx.lock_book(loan.book_id).await? {
                tx.set_available_copies(book.id, book.available_copies + 1).await?;
            }
        }
        tx.delete_member(id).await?;
        tx.commit().await?;

        tracing::info!("Member deleted: id={}, active loans closed={}", id, active.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use std::sync::Arc;

    fn service() -> MembersService {
        MembersService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let members = service();
        let first = members.get_or_create_by_email("new.reader@example.org").await.unwrap();
        let second = members.get_or_create_by_email("new.reader@example.org").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.first_name, "New");
        assert_eq!(first.last_name, "Reader");
    }

    #[tokio::test]
    async fn test_concurrent_first_access_creates_one_member() {
        let members = service();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let members = members.clone();
                tokio::spawn(async move { members.get_or_create_by_email("race@example.org").await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let all = members
            .search(&Caller::admin("admin@example.org"), &MemberQuery::default())
            .await
            .unwrap();
        assert_eq!(all.iter().filter(|m| m.email == "race@example.org").count(), 1);
    }

    #[tokio::test]
    async fn test_member_cannot_act_for_someone_else() {
        let members = service();
        let other = members.get_or_create_by_email("other@example.org").await.unwrap();
        let caller = Caller::member("me@example.org");

        let err = members.acting_member_id(&caller, Some(other.id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        let me = members.acting_member_id(&caller, None).await.unwrap();
        assert_ne!(me, other.id);
    }

    #[tokio::test]
    async fn test_admin_only_crud() {
        let members = service();
        let request = CreateMember {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.org".into(),
            membership_date: None,
        };

        let err = members
            .create(&Caller::member("ada@example.org"), request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        let admin = Caller::admin("admin@example.org");
        let created = members.create(&admin, request.clone()).await.unwrap();
        assert_eq!(created.full_name(), "Ada Lovelace");

        let err = members.create(&admin, request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let members = service();
        let request = CreateMember {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "not-an-email".into(),
            membership_date: None,
        };
        let err = members
            .create(&Caller::admin("admin@example.org"), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
