use crate::db::{self, query, StoreError};
use crate::policy::{Decision, Operation, Requester};
use crate::schema::{CollectionDef, ValidationError, DIAGRAMS};
use crate::types::{Diagram, DiagramId, DiagramPatch, ListResult, NewDiagram, UserId};
use chrono::Duration;
use rusqlite::Connection;
use thiserror::Error;

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    /// Refuse creates whose owner differs from the requester
    pub enforce_owner_on_create: bool,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("The '{0}' collection does not exist; run `dbdiagrams migrate up` first")]
    NotMigrated(&'static str),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Not allowed to {0} this diagram")]
    Forbidden(Operation),
    #[error("Diagram '{0}' not found")]
    NotFound(DiagramId),
    #[error("Owner '{0}' does not exist")]
    UnknownOwner(UserId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Diagram requests checked against the registered collection's fields and rules
pub struct DiagramService<'c> {
    conn: &'c Connection,
    collection: CollectionDef,
    options: ServiceOptions,
}

impl<'c> DiagramService<'c> {
    pub fn new(conn: &'c Connection, options: ServiceOptions) -> Result<Self, ServiceError> {
        let collection =
            db::find_collection(conn, DIAGRAMS)?.ok_or(ServiceError::NotMigrated(DIAGRAMS))?;
        Ok(Self {
            conn,
            collection,
            options,
        })
    }

    fn require(
        &self,
        operation: Operation,
        requester: &Requester,
        diagram: &Diagram,
    ) -> Result<(), ServiceError> {
        match self
            .collection
            .rules
            .authorize(operation, requester, &diagram.fields())
        {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                tracing::warn!(%operation, diagram = %diagram.id, ?requester, "request denied");
                match requester {
                    Requester::Anonymous => Err(ServiceError::Unauthenticated),
                    Requester::User(_) => Err(ServiceError::Forbidden(operation)),
                }
            }
        }
    }

    fn load(&self, id: &DiagramId) -> Result<Diagram, ServiceError> {
        query::get_diagram(self.conn, id)?.ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// One page of the diagrams the requester may list, newest update first.
    /// `page` is 1-based; `per_page` is clamped to `1..=MAX_PER_PAGE`.
    pub fn list(
        &self,
        requester: &Requester,
        page: usize,
        per_page: usize,
    ) -> Result<ListResult<Diagram>, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let filter = self.collection.rules.list.list_filter(requester);

        let total = query::count_diagrams(self.conn, &filter)?;
        let mut items = match (page - 1).checked_mul(per_page) {
            Some(offset) if offset < total => {
                query::list_diagrams(self.conn, &filter, per_page, offset)?
            }
            _ => Vec::new(),
        };
        items.retain(|d| {
            self.collection
                .rules
                .authorize(Operation::List, requester, &d.fields())
                .is_allowed()
        });

        Ok(ListResult::new(page, per_page, total, items))
    }

    /// Every diagram the requester may list
    pub fn list_all(&self, requester: &Requester) -> Result<Vec<Diagram>, ServiceError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let result = self.list(requester, page, MAX_PER_PAGE)?;
            let last = page >= result.total_pages;
            all.extend(result.items);
            if last {
                return Ok(all);
            }
            page += 1;
        }
    }

    pub fn view(&self, requester: &Requester, id: &DiagramId) -> Result<Diagram, ServiceError> {
        let diagram = self.load(id)?;
        self.require(Operation::View, requester, &diagram)?;
        Ok(diagram)
    }

    /// Create a diagram; the owner defaults to the requester
    pub fn create(&self, requester: &Requester, input: NewDiagram) -> Result<Diagram, ServiceError> {
        let owner = input
            .owner
            .or_else(|| requester.identity().cloned())
            .unwrap_or_else(|| UserId::from(""));
        let ts = db::now();
        let diagram = Diagram {
            id: DiagramId::generate(),
            name: input.name,
            description: input.description.unwrap_or_default(),
            dbml: input.dbml,
            canvas_state: input.canvas_state.filter(|v| !v.is_null()),
            owner,
            created: ts,
            updated: ts,
        };

        self.require(Operation::Create, requester, &diagram)?;
        if self.options.enforce_owner_on_create
            && requester.identity() != Some(&diagram.owner)
        {
            tracing::warn!(owner = %diagram.owner, ?requester, "create for another owner refused");
            return Err(ServiceError::Forbidden(Operation::Create));
        }

        self.collection.validate(&diagram.fields())?;
        if db::users::find_user(self.conn, &diagram.owner)?.is_none() {
            return Err(ServiceError::UnknownOwner(diagram.owner));
        }

        query::insert_diagram(self.conn, &diagram)?;
        tracing::info!(diagram = %diagram.id, owner = %diagram.owner, "diagram created");
        Ok(diagram)
    }

    /// Apply a partial update and revalidate the whole record
    pub fn update(
        &self,
        requester: &Requester,
        id: &DiagramId,
        patch: DiagramPatch,
    ) -> Result<Diagram, ServiceError> {
        let mut diagram = self.load(id)?;
        self.require(Operation::Update, requester, &diagram)?;

        let previous = diagram.updated;
        diagram.apply(patch);
        self.collection.validate(&diagram.fields())?;

        // keep `updated` strictly increasing so list order follows edits
        diagram.updated = db::now().max(previous + Duration::microseconds(1));
        if !query::update_diagram(self.conn, &diagram)? {
            return Err(ServiceError::NotFound(id.clone()));
        }
        tracing::info!(diagram = %diagram.id, "diagram updated");
        Ok(diagram)
    }

    pub fn delete(&self, requester: &Requester, id: &DiagramId) -> Result<(), ServiceError> {
        let diagram = self.load(id)?;
        self.require(Operation::Delete, requester, &diagram)?;

        if !query::delete_diagram(self.conn, id)? {
            return Err(ServiceError::NotFound(id.clone()));
        }
        tracing::info!(diagram = %id, "diagram deleted");
        Ok(())
    }
}
