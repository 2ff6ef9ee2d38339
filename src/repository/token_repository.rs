use crate::models::TokenInfo;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::str::FromStr;

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    const INSERT_TOKEN: &'static str =
        "INSERT OR IGNORE INTO tokens (address, symbol, decimals, name, kind)
         VALUES (?1, ?2, ?3, ?4, ?5)";

    const SELECT_TOKEN: &'static str = "SELECT address, symbol, decimals, name, kind FROM tokens";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns false when the address was already stored.
    pub fn insert(&self, token: &TokenInfo) -> Result<bool> {
        let inserted = self.conn.execute(
            Self::INSERT_TOKEN,
            params![
                format!("{:?}", token.address),
                token.symbol,
                token.decimals,
                token.name,
                token.kind,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn get(&self, address: &Address) -> Result<Option<TokenInfo>> {
        let sql = format!("{} WHERE address = ?1", Self::SELECT_TOKEN);
        let token = self
            .conn
            .query_row(&sql, params![format!("{address:?}")], Self::row_to_token)
            .optional()?;
        Ok(token)
    }

    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<TokenInfo>> {
        let sql = format!(
            "{} ORDER BY rowid LIMIT ?1 OFFSET ?2",
            Self::SELECT_TOKEN
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tokens = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_token)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tokens)
    }

    pub fn count(&self) -> Result<usize> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<TokenInfo> {
        let address: String = row.get(0)?;
        let address = Address::from_str(&address).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(TokenInfo {
            address,
            symbol: row.get(1)?,
            decimals: row.get(2)?,
            name: row.get(3)?,
            kind: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    fn token(byte: u8, symbol: &str) -> TokenInfo {
        TokenInfo::erc20(
            Address::repeat_byte(byte),
            format!("{symbol} Token"),
            symbol.to_string(),
            byte,
        )
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        assert!(repo.insert(&token(1, "AAA")).unwrap());
        let stored = repo.get(&Address::repeat_byte(1)).unwrap().unwrap();
        assert_eq!(stored, token(1, "AAA"));
        assert!(repo.get(&Address::repeat_byte(2)).unwrap().is_none());
    }

    #[test]
    fn duplicate_address_is_ignored() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        assert!(repo.insert(&token(1, "AAA")).unwrap());
        assert!(!repo.insert(&token(1, "OTHER")).unwrap());
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.get(&Address::repeat_byte(1)).unwrap().unwrap().symbol, "AAA");
    }

    #[test]
    fn list_preserves_insertion_order() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        for (byte, symbol) in [(3, "C"), (1, "A"), (2, "B")] {
            repo.insert(&token(byte, symbol)).unwrap();
        }

        let symbols: Vec<_> = repo
            .list(10, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(symbols, vec!["C", "A", "B"]);

        let page = repo.list(1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].symbol, "A");
    }
}
