//! Reservation queue: FIFO claims on out-of-stock books

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{CreateReservation, NewReservation, Reservation, ReservationFilter},
        Caller,
    },
    repository::Repository,
};

use super::members::{ensure_owner, MembersService};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    members: MembersService,
}

impl ReservationsService {
    pub fn new(repository: Repository, members: MembersService) -> Self {
        Self { repository, members }
    }

    /// Join the queue for a book that has no copy on the shelf.
    ///
    /// The stock check and the insert share a transaction holding the book
    /// row, so a concurrent return cannot slip in between.
    pub async fn create(&self, caller: &Caller, request: CreateReservation) -> AppResult<Reservation> {
        let member_id = self.members.acting_member_id(caller, request.member_id).await?;

        let mut tx = self.repository.begin().await?;

        if tx.lock_member(member_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Member with id {} not found", member_id)));
        }
        let book = tx
            .lock_book(request.book_id)
            .await?
            .ok_or(AppError::BookNotFound(request.book_id))?;
        if book.is_available() {
            return Err(AppError::BookAvailable(book.id));
        }

        let reservation = tx
            .insert_reservation(&NewReservation {
                book_id: book.id,
                member_id,
                reserved_at: Utc::now(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Reservation created: id={} book={} member={}",
            reservation.id,
            reservation.book_id,
            reservation.member_id
        );
        Ok(reservation)
    }

    /// Leave the queue
    pub async fn cancel(&self, caller: &Caller, id: i32) -> AppResult<()> {
        let reservation = self.get(caller, id).await?;
        if !self.repository.delete_reservation(reservation.id).await? {
            return Err(not_found(id));
        }
        tracing::info!("Reservation cancelled: id={}", id);
        Ok(())
    }

    pub async fn get(&self, caller: &Caller, id: i32) -> AppResult<Reservation> {
        let reservation = self
            .repository
            .get_reservation(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.members.authorize(caller, reservation.member_id).await?;
        Ok(reservation)
    }

    /// Reservations visible to the caller, in queue order
    pub async fn list(&self, caller: &Caller, filter: ReservationFilter) -> AppResult<Vec<Reservation>> {
        let filter = match self.members.scope(caller).await? {
            None => filter,
            Some(me) => {
                if let Some(requested) = filter.member_id {
                    ensure_owner(Some(me), requested)?;
                }
                ReservationFilter {
                    member_id: Some(me),
                    ..filter
                }
            }
        };
        self.repository.list_reservations(&filter).await
    }

    /// The caller's own reservations
    pub async fn own(&self, caller: &Caller) -> AppResult<Vec<Reservation>> {
        let me = self.members.resolve(caller).await?;
        self.repository
            .list_reservations(&ReservationFilter {
                member_id: Some(me.id),
                book_id: None,
            })
            .await
    }

    /// Waiting list for a book, head first
    pub async fn queue(&self, caller: &Caller, book_id: i32) -> AppResult<Vec<Reservation>> {
        caller.require_admin()?;
        if self.repository.get_book(book_id).await?.is_none() {
            return Err(AppError::BookNotFound(book_id));
        }
        self.repository
            .list_reservations(&ReservationFilter {
                member_id: None,
                book_id: Some(book_id),
            })
            .await
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Reservation with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::book::CreateBook,
        repository::{LibraryStore, MemoryStore},
    };
    use std::sync::Arc;

    async fn setup(copies: i32) -> (ReservationsService, i32) {
        let store = Arc::new(MemoryStore::new());
        let book = store
            .insert_book(&CreateBook {
                title: "Les Misérables".into(),
                author: "Victor Hugo".into(),
                isbn: "978-2253096344".into(),
                publication_year: 1862,
                category_id: None,
                available_copies: copies,
                image_url: None,
            })
            .await
            .unwrap();
        let repository: Repository = store;
        let members = MembersService::new(repository.clone());
        (ReservationsService::new(repository, members), book.id)
    }

    fn reserve(book_id: i32) -> CreateReservation {
        CreateReservation { book_id, member_id: None }
    }

    #[tokio::test]
    async fn test_cannot_reserve_available_book() {
        let (reservations, book_id) = setup(1).await;
        let err = reservations
            .create(&Caller::member("a@example.org"), reserve(book_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookAvailable(id) if id == book_id));
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let (reservations, _) = setup(0).await;
        let err = reservations
            .create(&Caller::member("a@example.org"), reserve(404))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookNotFound(404)));
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let (reservations, book_id) = setup(0).await;
        let first = reservations
            .create(&Caller::member("first@example.org"), reserve(book_id))
            .await
            .unwrap();
        let second = reservations
            .create(&Caller::member("second@example.org"), reserve(book_id))
            .await
            .unwrap();

        let queue = reservations
            .queue(&Caller::admin("admin@example.org"), book_id)
            .await
            .unwrap();
        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_only_owner_cancels() {
        let (reservations, book_id) = setup(0).await;
        let owner = Caller::member("owner@example.org");
        let reservation = reservations.create(&owner, reserve(book_id)).await.unwrap();

        let err = reservations
            .cancel(&Caller::member("other@example.org"), reservation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        reservations.cancel(&owner, reservation.id).await.unwrap();
        assert!(reservations.own(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_members_list_only_their_own() {
        let (reservations, book_id) = setup(0).await;
        let a = Caller::member("a@example.org");
        let b = Caller::member("b@example.org");
        reservations.create(&a, reserve(book_id)).await.unwrap();
        reservations.create(&b, reserve(book_id)).await.unwrap();

        let visible = reservations.list(&a, ReservationFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 1);

        let all = reservations
            .list(&Caller::admin("admin@example.org"), ReservationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
