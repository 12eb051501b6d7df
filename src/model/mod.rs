/// Stores a closed string enum in a VARCHAR column.
///
/// The enum must implement `AsRef<str>` and `FromStr` (both derived through strum).
macro_rules! mysql_string_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::MySql> for $ty {
            fn type_info() -> sqlx::mysql::MySqlTypeInfo {
                <str as sqlx::Type<sqlx::MySql>>::type_info()
            }

            fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::MySql>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::MySql> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::MySql as sqlx::database::HasArguments<'q>>::ArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                let value: &str = self.as_ref();
                <&str as sqlx::Encode<'q, sqlx::MySql>>::encode_by_ref(&value, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::MySql> for $ty {
            fn decode(
                value: sqlx::mysql::MySqlValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::MySql>>::decode(value)?;
                raw.parse::<$ty>()
                    .map_err(|_| format!("invalid {} value: {}", stringify!($ty), raw).into())
            }
        }
    };
}

pub(crate) use mysql_string_enum;

pub mod attendance;
pub mod department;
pub mod employee;
pub mod holiday;
pub mod leave_request;
pub mod payroll;
pub mod performance;
pub mod role;
