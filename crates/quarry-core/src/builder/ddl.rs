//! Schema manipulation statements.

use std::sync::LazyLock;

use regex::Regex;

use super::QueryBuilder;

static SIZED_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\((.+?)\)(.*)$").expect("valid sized type pattern"));
static SUFFIXED_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+").expect("valid suffixed type pattern"));
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.+\)").expect("valid parenthesized pattern"));

impl QueryBuilder<'_> {
    fn mapped_type(&self, name: &str) -> Option<&'static str> {
        self.dialect
            .column_type_map()
            .iter()
            .find(|(abstract_type, _)| *abstract_type == name)
            .map(|(_, physical)| *physical)
    }

    /// Maps an abstract column type to the dialect's physical type.
    ///
    /// Accepts a bare abstract type (`string`), a sized one (`string(32)`,
    /// `decimal(10,2) NOT NULL`) or one followed by constraints
    /// (`integer NOT NULL`). Unknown types pass through.
    #[must_use]
    pub fn column_type(&self, abstract_type: &str) -> String {
        if let Some(physical) = self.mapped_type(abstract_type) {
            return physical.to_string();
        }
        if let Some(caps) = SIZED_TYPE.captures(abstract_type) {
            if let Some(physical) = self.mapped_type(&caps[1]) {
                let sized = PARENTHESIZED.replace(physical, format!("({})", &caps[2]).as_str());
                return format!("{sized}{}", &caps[3]);
            }
        } else if let Some(caps) = SUFFIXED_TYPE.captures(abstract_type) {
            if let Some(physical) = self.mapped_type(&caps[1]) {
                return format!("{physical}{}", &abstract_type[caps[1].len()..]);
            }
        }
        abstract_type.to_string()
    }

    /// `CREATE TABLE`. An entry with an empty name is emitted verbatim, which
    /// allows table constraints among the columns.
    #[must_use]
    pub fn create_table(&self, table: &str, columns: &[(&str, &str)], options: Option<&str>) -> String {
        let lines: Vec<String> = columns
            .iter()
            .map(|(name, column_type)| {
                if name.is_empty() {
                    format!("\t{column_type}")
                } else {
                    format!(
                        "\t{} {}",
                        self.dialect.quote_column_name(name),
                        self.column_type(column_type)
                    )
                }
            })
            .collect();
        let sql = format!(
            "CREATE TABLE {} (\n{}\n)",
            self.dialect.quote_table_name(table),
            lines.join(",\n")
        );
        match options {
            Some(options) => format!("{sql} {options}"),
            None => sql,
        }
    }

    /// `DROP TABLE`.
    #[must_use]
    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.dialect.quote_table_name(table))
    }

    /// Removes every row of `table`.
    #[must_use]
    pub fn truncate_table(&self, table: &str) -> String {
        self.dialect
            .truncate_table_sql(&self.dialect.quote_table_name(table))
    }

    /// Renames a table.
    #[must_use]
    pub fn rename_table(&self, from: &str, to: &str) -> String {
        self.dialect.rename_table_sql(
            &self.dialect.quote_table_name(from),
            &self.dialect.quote_table_name(to),
        )
    }

    /// `ALTER TABLE .. ADD ..`.
    #[must_use]
    pub fn add_column(&self, table: &str, column: &str, column_type: &str) -> String {
        format!(
            "ALTER TABLE {} ADD {} {}",
            self.dialect.quote_table_name(table),
            self.dialect.quote_column_name(column),
            self.column_type(column_type)
        )
    }

    /// `ALTER TABLE .. DROP COLUMN ..`.
    #[must_use]
    pub fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.dialect.quote_table_name(table),
            self.dialect.quote_column_name(column)
        )
    }

    /// `CREATE [UNIQUE] INDEX`.
    #[must_use]
    pub fn create_index<S: AsRef<str>>(&self, name: &str, table: &str, columns: &[S], unique: bool) -> String {
        format!(
            "{} {} ON {} ({})",
            if unique {
                "CREATE UNIQUE INDEX"
            } else {
                "CREATE INDEX"
            },
            self.dialect.quote_table_name(name),
            self.dialect.quote_table_name(table),
            self.quote_column_list(columns)
        )
    }

    /// Drops an index of `table`.
    #[must_use]
    pub fn drop_index(&self, name: &str, table: &str) -> String {
        self.dialect.drop_index_sql(
            &self.dialect.quote_table_name(name),
            &self.dialect.quote_table_name(table),
        )
    }
}
