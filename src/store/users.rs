/*!
`Store` methods specific to staff users.

Passwords live in the Users tab but never leave the server, so a client
editing a user doesn't know the stored password. An update carrying an
empty password keeps the one already in the row.
*/
use super::Store;
use crate::error::Error;
use crate::record::Record;
use crate::sheets::Sheets;
use crate::user::{Role, User};

impl<S: Sheets> Store<S> {
    pub async fn update_user(
        &self,
        spreadsheet_id: &str,
        u: &User,
    ) -> Result<User, Error> {
        log::trace!("Store::update_user( {:?}, {:?} ) called.", spreadsheet_id, &u.id);

        let _guard = self.locks.lock(spreadsheet_id, User::TAB).await;
        self.provision_tab(spreadsheet_id, User::TAB, User::header_row()).await?;

        let row = match self.find_row_index(spreadsheet_id, User::TAB, &u.id).await? {
            Some(n) => n,
            None => { return Err(Error::not_found(User::KIND, &u.id)); },
        };

        let mut new_u = u.clone();
        if new_u.password.is_empty() {
            let existing = self.sheets.get_values(spreadsheet_id, &User::row_range(row)).await
                .map_err(|e| e.annotate("Unable to read existing user row"))?;
            if let Some(old) = existing.first().and_then(|r| User::from_row(r)) {
                new_u.password = old.password;
            }
        }

        self.update_row(spreadsheet_id, &User::row_range(row), new_u.to_row()).await?;
        Ok(new_u)
    }

    /// Users with the `teacher` role, for resolving group assignments.
    pub async fn get_teachers(&self, spreadsheet_id: &str) -> Result<Vec<User>, Error> {
        log::trace!("Store::get_teachers( {:?} ) called.", spreadsheet_id);

        let users: Vec<User> = self.list(spreadsheet_id).await?;
        Ok(users.into_iter().filter(|u| u.role == Role::Teacher).collect())
    }
}
