/// Declares a record struct together with everything a [`Store`](crate::Store) needs.
///
/// For `struct Name { .. }` this generates
/// - the struct itself, with the given attributes,
/// - `NamePartial`: every field wrapped in `Option`, `Default`, plus a builder
///   setter per field,
/// - `impl Record for Name` with a shallow merge,
/// - `mod name_keys`: one unit struct per field, in UpperCamelCase, implementing
///   [`Key<Name>`](crate::Key).
///
/// The struct must be `Clone + PartialEq + Send + Sync + 'static`.
///
/// # Examples
/// ```
/// use rxstore::{record, Store};
///
/// record! {
///     #[derive(Clone, Debug, PartialEq)]
///     pub struct Profile {
///         pub user_name: String,
///         pub age: u32,
///     }
/// }
///
/// fn main() {
///     let store = Store::new(Profile { user_name: String::from("zahash"), age: 3 });
///     store.set_state(ProfilePartial::default().age(4));
///
///     let ages = store.select(profile_keys::Age);
///     ages.subscribe(|age| assert_eq!(4, *age));
///
///     assert_eq!("zahash", store.state().user_name);
/// }
/// ```

#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => { $crate::__private::paste! {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field: $ty, )*
        }

        #[doc = "Partial update for [`" $name "`]; `None` fields are left untouched."]
        #[derive(Clone, Default)]
        $vis struct [<$name Partial>] {
            $( $field_vis $field: ::std::option::Option<$ty>, )*
        }

        impl [<$name Partial>] {
            $(
                #[allow(dead_code)]
                pub fn $field(mut self, value: $ty) -> Self {
                    self.$field = ::std::option::Option::Some(value);
                    self
                }
            )*
        }

        impl $crate::Record for $name {
            type Partial = [<$name Partial>];

            fn merge(&mut self, partial: Self::Partial) {
                $(
                    if let ::std::option::Option::Some(value) = partial.$field {
                        self.$field = value;
                    }
                )*
            }
        }

        #[doc = "Field keys of [`" $name "`]."]
        #[allow(dead_code)]
        $vis mod [<$name:snake _keys>] {
            $(
                #[derive(Clone, Copy, Debug, Default)]
                pub struct [<$field:camel>];
            )*
        }

        // outside the module, where a key named like its field type can't shadow it
        $(
            impl $crate::Key<$name> for [<$name:snake _keys>]::[<$field:camel>] {
                type Value = $ty;

                const NAME: &'static str = ::std::stringify!($field);

                fn get(state: &$name) -> &$ty {
                    &state.$field
                }
            }
        )*
    }};
}
