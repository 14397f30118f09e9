use crate::model::{User, UserCreate, UserFilter, UserId, UserUpdate};
use storefront_kit::{CacheKey, Document, IdentifierAllocator, ReadThroughCache, ServiceError, StoreClient};
use tracing::{debug, info, instrument};

pub(crate) fn user_key(id: UserId) -> CacheKey {
    CacheKey::new(User::KIND, id)
}

#[derive(Clone)]
pub struct UserUsecase {
    users: StoreClient<User>,
    ids: IdentifierAllocator,
    cache: ReadThroughCache,
}

impl UserUsecase {
    pub fn new(users: StoreClient<User>, ids: IdentifierAllocator, cache: ReadThroughCache) -> Self {
        Self { users, ids, cache }
    }

    /// Registers a user. Emails are unique, compared case-insensitively.
    #[instrument(skip(self, params), fields(email = %params.email))]
    pub async fn create_user(&self, params: UserCreate) -> Result<User, ServiceError> {
        if params.name.trim().is_empty() {
            return Err(ServiceError::validation("name is required"));
        }
        let email = normalize_email(&params.email)?;
        self.ensure_email_free(&email, None).await?;

        let id = UserId(self.ids.next(User::KIND).await?);
        let user = User {
            id,
            name: params.name,
            email,
            role: params.role.unwrap_or_default(),
        };
        self.users.insert(user.clone()).await?;
        info!(%id, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.cache
            .get_or_fetch(&user_key(id), || async {
                self.users
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(User::KIND, id))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email)?;
        self.users
            .find_one(UserFilter::email(email.as_str()))
            .await?
            .ok_or_else(|| ServiceError::not_found(User::KIND, email))
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: UserId, mut update: UserUpdate) -> Result<User, ServiceError> {
        if update.is_empty() {
            return Err(ServiceError::validation("nothing to update"));
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ServiceError::validation("name cannot be empty"));
            }
        }
        if let Some(email) = update.email.take() {
            let email = normalize_email(&email)?;
            self.ensure_email_free(&email, Some(id)).await?;
            update.email = Some(email);
        }

        let updated = self
            .users
            .update_one(User::by_id(id), update)
            .await?
            .ok_or_else(|| ServiceError::not_found(User::KIND, id))?;
        self.cache.invalidate(&user_key(id)).await;
        info!(%id, "User updated");
        Ok(updated)
    }

    /// Check-then-write: two concurrent registrations with the same email can
    /// both pass. A unique index on the store is what closes that gap.
    async fn ensure_email_free(&self, email: &str, owner: Option<UserId>) -> Result<(), ServiceError> {
        match self.users.find_one(UserFilter::email(email)).await? {
            Some(existing) if Some(existing.id) != owner => {
                debug!(existing = %existing.id, "Email already registered");
                Err(ServiceError::validation(format!("email already registered: {email}")))
            }
            _ => Ok(()),
        }
    }
}

fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ServiceError::validation("email is required"));
    }
    if !email.contains('@') {
        return Err(ServiceError::validation(format!("invalid email: {email}")));
    }
    Ok(email.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use std::sync::Arc;
    use storefront_kit::{Counter, MemoryCache, StoreActor, DEFAULT_CACHE_TTL};

    fn usecase() -> UserUsecase {
        let (counter_actor, counters) = StoreActor::<Counter>::new(16);
        let (user_actor, users) = StoreActor::<User>::new(16);
        tokio::spawn(counter_actor.run());
        tokio::spawn(user_actor.run());
        UserUsecase::new(
            users,
            IdentifierAllocator::new(Arc::new(counters)),
            ReadThroughCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL),
        )
    }

    fn alice() -> UserCreate {
        UserCreate {
            name: "Alice".into(),
            email: "Alice@Example.com".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn create_then_lookup_by_id_and_email() {
        let users = usecase();
        let created = users.create_user(alice()).await.unwrap();
        assert_eq!(created.id, UserId(1));
        assert_eq!(created.email, "alice@example.com");
        assert_eq!(created.role, Role::Customer);

        assert_eq!(users.get_user(created.id).await.unwrap(), created);
        assert_eq!(users.get_user_by_email("ALICE@example.com").await.unwrap(), created);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = usecase();
        users.create_user(alice()).await.unwrap();
        let err = users.create_user(alice()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn update_evicts_the_cached_user() {
        let users = usecase();
        let created = users.create_user(alice()).await.unwrap();
        users.get_user(created.id).await.unwrap();

        users
            .update_user(
                created.id,
                UserUpdate {
                    name: Some("Alicia".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(users.get_user(created.id).await.unwrap().name, "Alicia");
    }

    #[tokio::test]
    async fn email_can_be_kept_but_not_taken() {
        let users = usecase();
        let a = users.create_user(alice()).await.unwrap();
        let b = users
            .create_user(UserCreate {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                role: Some(Role::Admin),
            })
            .await
            .unwrap();

        let keep = UserUpdate {
            email: Some("alice@example.com".into()),
            ..Default::default()
        };
        assert!(users.update_user(a.id, keep).await.is_ok());

        let steal = UserUpdate {
            email: Some("alice@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            users.update_user(b.id, steal).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let users = usecase();
        assert!(matches!(
            users.get_user(UserId(9)).await,
            Err(ServiceError::NotFound { kind: "user", .. })
        ));
        assert!(matches!(
            users.get_user_by_email("nobody@example.com").await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
