// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity linker: the join key between the two directories.
//!
//! Links can change at runtime, so results are cached only inside a
//! [`LinkScope`], which lives for a single reconciliation pass.

use std::collections::HashMap;
use std::sync::Arc;

use guildsync_core::{ChatId, GameId, LinkService, SyncError};
use tracing::debug;

/// Outcome of resolving a game account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Linked(ChatId),
    /// No association exists. Callers skip the identity; this is not a fault.
    NotLinked,
}

impl Link {
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Link::Linked(id) => Some(id),
            Link::NotLinked => None,
        }
    }
}

/// Hands out per-pass resolution scopes over the link service.
#[derive(Clone)]
pub struct IdentityLinker {
    service: Arc<dyn LinkService>,
}

impl IdentityLinker {
    pub fn new(service: Arc<dyn LinkService>) -> Self {
        Self { service }
    }

    /// Start a fresh scope. Drop it when the pass ends.
    pub fn scope(&self) -> LinkScope {
        LinkScope {
            service: Arc::clone(&self.service),
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

/// Resolution cache for the duration of one pass.
pub struct LinkScope {
    service: Arc<dyn LinkService>,
    forward: HashMap<GameId, Link>,
    reverse: HashMap<ChatId, Option<GameId>>,
}

impl LinkScope {
    /// Resolve a game account to its chat account.
    pub async fn resolve(&mut self, game_id: &GameId) -> Result<Link, SyncError> {
        if let Some(link) = self.forward.get(game_id) {
            return Ok(link.clone());
        }

        let link = match self.service.chat_id_for(game_id).await? {
            Some(chat_id) => Link::Linked(chat_id),
            None => {
                debug!(game_id = %game_id, "identity not linked");
                Link::NotLinked
            }
        };
        self.forward.insert(game_id.clone(), link.clone());
        Ok(link)
    }

    /// Resolve a chat account back to its game account.
    pub async fn resolve_chat(&mut self, chat_id: &ChatId) -> Result<Option<GameId>, SyncError> {
        if let Some(game_id) = self.reverse.get(chat_id) {
            return Ok(game_id.clone());
        }

        let game_id = self.service.game_id_for(chat_id).await?;
        self.reverse.insert(chat_id.clone(), game_id.clone());
        Ok(game_id)
    }

    /// Seed the scope with a link the caller already knows (a fresh link event).
    pub fn assume(&mut self, game_id: GameId, chat_id: ChatId) {
        self.reverse.insert(chat_id.clone(), Some(game_id.clone()));
        self.forward.insert(game_id, Link::Linked(chat_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildsync_test_utils::MockLinkService;

    #[tokio::test]
    async fn resolves_linked_and_unlinked_accounts() {
        let service = Arc::new(MockLinkService::new());
        service.link("steam-1", "chat-1");
        let linker = IdentityLinker::new(service.clone());
        let mut scope = linker.scope();

        let link = scope.resolve(&GameId::from("steam-1")).await.unwrap();
        assert_eq!(link, Link::Linked(ChatId::from("chat-1")));
        let missing = scope.resolve(&GameId::from("steam-2")).await.unwrap();
        assert_eq!(missing, Link::NotLinked);
        assert_eq!(
            scope.resolve_chat(&ChatId::from("chat-1")).await.unwrap(),
            Some(GameId::from("steam-1"))
        );
    }

    #[tokio::test]
    async fn scope_caches_but_new_scope_sees_unlink() {
        let service = Arc::new(MockLinkService::new());
        service.link("steam-1", "chat-1");
        let linker = IdentityLinker::new(service.clone());

        let mut scope = linker.scope();
        scope.resolve(&GameId::from("steam-1")).await.unwrap();
        scope.resolve(&GameId::from("steam-1")).await.unwrap();
        assert_eq!(service.lookup_count(), 1);

        service.unlink("steam-1");
        assert!(scope.resolve(&GameId::from("steam-1")).await.unwrap().chat_id().is_some());

        let mut next = linker.scope();
        assert_eq!(
            next.resolve(&GameId::from("steam-1")).await.unwrap(),
            Link::NotLinked
        );
    }

    #[tokio::test]
    async fn assumed_links_skip_the_service() {
        let service = Arc::new(MockLinkService::new());
        let linker = IdentityLinker::new(service.clone());
        let mut scope = linker.scope();
        scope.assume(GameId::from("g"), ChatId::from("c"));

        assert_eq!(
            scope.resolve(&GameId::from("g")).await.unwrap(),
            Link::Linked(ChatId::from("c"))
        );
        assert_eq!(service.lookup_count(), 0);
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let service = Arc::new(MockLinkService::new());
        service.fail_next("link db down");
        let linker = IdentityLinker::new(service);
        let err = linker.scope().resolve(&GameId::from("g")).await.unwrap_err();
        assert!(matches!(err, SyncError::Link { .. }));
    }
}
