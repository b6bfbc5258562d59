//! Row-to-record mapping driven by a declared property table.
//!
//! A [`Mappable`] record lists its properties (name, declared type, setter). For each
//! result set the mapper resolves property names against column names once, ignoring
//! case, then creates one default record per row and runs the setters of the matched
//! properties. Columns without a property are ignored; properties without a column keep
//! their default value.
//!
//! Two columns whose names differ only by case resolve to the first one by ordinal.
//! Records should not declare such names; the outcome is not part of the contract.

use std::collections::HashMap;

use crate::conversion::ConversionError;
use crate::error::SprocDbError;
use crate::results::{ColumnSchema, ResultCursor};
use crate::types::{DbType, RowValues};

/// One settable property of a mapped record.
pub struct PropertyMap<T> {
    pub name: &'static str,
    pub db_type: DbType,
    pub nullable: bool,
    /// Convert the raw column value and store it; a null leaves plain properties untouched.
    pub assign: fn(&mut T, &RowValues) -> Result<(), ConversionError>,
}

impl<T> std::fmt::Debug for PropertyMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyMap")
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// A plain record that rows can be mapped into.
///
/// Usually implemented with [`impl_mappable!`](crate::impl_mappable).
pub trait Mappable: Default {
    fn properties() -> Vec<PropertyMap<Self>>;
}

struct Binding<'p, T> {
    property: &'p PropertyMap<T>,
    ordinal: usize,
    column: &'p str,
}

fn bind_columns<'p, T>(
    columns: &'p [ColumnSchema],
    properties: &'p [PropertyMap<T>],
) -> Vec<Binding<'p, T>> {
    let wanted: Vec<String> = properties.iter().map(|p| p.name.to_lowercase()).collect();

    let mut by_name: HashMap<String, &ColumnSchema> = HashMap::new();
    for column in columns {
        let key = column.name.to_lowercase();
        if wanted.contains(&key) {
            by_name.entry(key).or_insert(column);
        }
    }

    properties
        .iter()
        .zip(&wanted)
        .filter_map(|(property, key)| {
            by_name.get(key).map(|column| Binding {
                property,
                ordinal: column.ordinal,
                column: column.name.as_str(),
            })
        })
        .collect()
}

fn map_current<T: Mappable>(
    cursor: &dyn ResultCursor,
    bindings: &[Binding<'_, T>],
) -> Result<T, SprocDbError> {
    let mut record = T::default();
    for binding in bindings {
        let raw = cursor.value(binding.ordinal)?;
        (binding.property.assign)(&mut record, raw)
            .map_err(|e| SprocDbError::mapping(binding.column, e.to_string()))?;
    }
    Ok(record)
}

/// Map every remaining row of the cursor's current result set.
///
/// # Errors
/// Returns the first read or conversion failure; nothing is returned partially.
pub fn map_rows<T: Mappable>(cursor: &mut dyn ResultCursor) -> Result<Vec<T>, SprocDbError> {
    let properties = T::properties();
    let columns = cursor.columns()?.to_vec();
    let bindings = bind_columns(&columns, &properties);

    let mut records = Vec::new();
    while cursor.read()? {
        records.push(map_current(cursor, &bindings)?);
    }
    Ok(records)
}

/// Map the first row of the current result set and skip the rest.
///
/// # Errors
/// Returns a read or conversion failure.
pub fn map_first<T: Mappable>(cursor: &mut dyn ResultCursor) -> Result<Option<T>, SprocDbError> {
    let properties = T::properties();
    let columns = cursor.columns()?.to_vec();
    let bindings = bind_columns(&columns, &properties);

    if !cursor.read()? {
        return Ok(None);
    }
    let record = map_current(cursor, &bindings)?;
    while cursor.read()? {}
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBehavior;
    use crate::results::{BufferedCursor, ResultSet};

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i32,
        name: String,
        age: Option<i32>,
    }

    crate::impl_mappable!(Person {
        id as "Id": i32,
        name: String,
        age: Option<i32>,
    });

    fn cursor(columns: &[&str], rows: Vec<Vec<RowValues>>) -> BufferedCursor {
        let mut rs = ResultSet::with_column_names(columns);
        for row in rows {
            rs.add_row_values(row).unwrap();
        }
        BufferedCursor::new(vec![rs], CommandBehavior::DEFAULT)
    }

    #[test]
    fn exact_match_case_insensitive() {
        let mut c = cursor(
            &["ID", "NAME", "Age"],
            vec![vec![
                RowValues::Int(1),
                RowValues::Text("Ann".into()),
                RowValues::Int(30),
            ]],
        );
        let people: Vec<Person> = map_rows(&mut c).unwrap();
        assert_eq!(
            people,
            vec![Person {
                id: 1,
                name: "Ann".into(),
                age: Some(30)
            }]
        );
    }

    #[test]
    fn subset_and_superset_of_columns() {
        let mut c = cursor(
            &["name", "Extra"],
            vec![vec![RowValues::Text("Bo".into()), RowValues::Int(9)]],
        );
        let people: Vec<Person> = map_rows(&mut c).unwrap();
        assert_eq!(
            people,
            vec![Person {
                id: 0,
                name: "Bo".into(),
                age: None
            }]
        );
    }

    #[test]
    fn null_handling_per_property_kind() {
        let mut c = cursor(
            &["Id", "Name", "Age"],
            vec![
                vec![RowValues::Null, RowValues::Null, RowValues::Null],
                vec![RowValues::Int(2), RowValues::Text("Cy".into()), RowValues::Text("41".into())],
            ],
        );
        let people: Vec<Person> = map_rows(&mut c).unwrap();
        assert_eq!(people[0], Person::default());
        assert_eq!(people[1].age, Some(41));
    }

    #[test]
    fn conversion_failure_names_column() {
        let mut c = cursor(&["Id"], vec![vec![RowValues::Text("x".into())]]);
        let err = map_rows::<Person>(&mut c).unwrap_err();
        assert!(matches!(err, SprocDbError::Mapping { ref column, .. } if column == "Id"));
    }

    #[test]
    fn duplicate_column_names_bind_first_ordinal() {
        let mut c = cursor(
            &["name", "NAME"],
            vec![vec![RowValues::Text("first".into()), RowValues::Text("second".into())]],
        );
        let people: Vec<Person> = map_rows(&mut c).unwrap();
        assert_eq!(people[0].name, "first");
    }

    #[test]
    fn first_row_only() {
        let mut c = cursor(
            &["Id"],
            vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
        );
        let person: Option<Person> = map_first(&mut c).unwrap();
        assert_eq!(person.map(|p| p.id), Some(1));
        assert!(!c.read().unwrap());

        let mut empty = cursor(&["Id"], Vec::new());
        assert_eq!(map_first::<Person>(&mut empty).unwrap(), None);
    }
}
