/// Implement [`Mappable`](crate::mapper::Mappable) for an existing `Default` struct.
///
/// Each entry names a field and its type; `as "Column"` overrides the property name the
/// mapper matches against (otherwise the field name is used). Matching ignores case.
///
/// ```rust
/// use sproc_middleware::impl_mappable;
///
/// #[derive(Debug, Default)]
/// struct EmployeeIdName {
///     id_dto: i32,
///     student_name: Option<String>,
/// }
///
/// impl_mappable!(EmployeeIdName {
///     id_dto as "IdDTO": i32,
///     student_name as "StudentName": Option<String>,
/// });
/// ```
#[macro_export]
macro_rules! impl_mappable {
    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident $alias:literal) => {
        $alias
    };
    ($record:ty { $($field:ident $(as $alias:literal)? : $fty:ty),* $(,)? }) => {
        impl $crate::mapper::Mappable for $record {
            fn properties() -> ::std::vec::Vec<$crate::mapper::PropertyMap<Self>> {
                ::std::vec![$(
                    $crate::mapper::PropertyMap {
                        name: $crate::impl_mappable!(@name $field $($alias)?),
                        db_type: <$fty as $crate::conversion::SqlField>::DB_TYPE,
                        nullable: <$fty as $crate::conversion::SqlField>::NULLABLE,
                        assign: |record: &mut $record,
                                 value: &$crate::types::RowValues|
                         -> ::std::result::Result<(), $crate::conversion::ConversionError> {
                            if let ::std::option::Option::Some(v) =
                                <$fty as $crate::conversion::SqlField>::from_column(value)?
                            {
                                record.$field = v;
                            }
                            ::std::result::Result::Ok(())
                        },
                    }
                ),*]
            }
        }
    };
}

/// Implement [`TableRecord`](crate::table::TableRecord) so a struct can be sent as rows of
/// a structured table-valued parameter.
///
/// Only the listed fields become columns, sorted by the given order value.
///
/// ```rust
/// use sproc_middleware::impl_table_record;
///
/// struct OrderLine {
///     sku: String,
///     quantity: Option<i32>,
/// }
///
/// impl_table_record!(OrderLine {
///     quantity: Option<i32> => ("Quantity", 2),
///     sku: String => ("Sku", 1),
/// });
/// ```
#[macro_export]
macro_rules! impl_table_record {
    ($record:ty { $($field:ident : $fty:ty => ($name:literal, $order:expr)),* $(,)? }) => {
        impl $crate::table::TableRecord for $record {
            fn table_columns() -> ::std::vec::Vec<$crate::table::ColumnSql<Self>> {
                ::std::vec![$(
                    $crate::table::ColumnSql {
                        name: $name,
                        order: $order,
                        db_type: <$fty as $crate::conversion::SqlField>::DB_TYPE,
                        value: |record: &$record| -> $crate::types::RowValues {
                            <$fty as $crate::conversion::SqlField>::to_row_value(&record.$field)
                        },
                    }
                ),*]
            }
        }
    };
}
