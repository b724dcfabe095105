use model::core::value::Value;
use mysql_async::{Params, Value as MySqlValue};

pub struct MySqlParam(MySqlValue);

impl MySqlParam {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => MySqlParam(MySqlValue::NULL),
            Value::Bytes(b) => MySqlParam(MySqlValue::Bytes(b.clone())),
            Value::Int(i) => MySqlParam(MySqlValue::Int(*i)),
            Value::Uint(u) => MySqlParam(MySqlValue::UInt(*u)),
            Value::Float(f) => MySqlParam(MySqlValue::Float(*f)),
            Value::Double(d) => MySqlParam(MySqlValue::Double(*d)),
            Value::Date(y, mo, d, h, mi, s, us) => {
                MySqlParam(MySqlValue::Date(*y, *mo, *d, *h, *mi, *s, *us))
            }
            Value::Time(neg, days, h, mi, s, us) => {
                MySqlParam(MySqlValue::Time(*neg, *days, *h, *mi, *s, *us))
            }
        }
    }

    pub fn into_inner(self) -> MySqlValue {
        self.0
    }
}

/// Converts a value read from MySQL into the store-neutral representation.
pub fn to_value(value: MySqlValue) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Bytes(b) => Value::Bytes(b),
        MySqlValue::Int(i) => Value::Int(i),
        MySqlValue::UInt(u) => Value::Uint(u),
        MySqlValue::Float(f) => Value::Float(f),
        MySqlValue::Double(d) => Value::Double(d),
        MySqlValue::Date(y, mo, d, h, mi, s, us) => Value::Date(y, mo, d, h, mi, s, us),
        MySqlValue::Time(neg, days, h, mi, s, us) => Value::Time(neg, days, h, mi, s, us),
    }
}

pub struct MySqlParamStore {
    pub params: Vec<MySqlParam>,
}

impl MySqlParamStore {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let params = values.into_iter().map(MySqlParam::from_value).collect();
        MySqlParamStore { params }
    }

    pub fn params(self) -> Params {
        let mysql_values: Vec<MySqlValue> =
            self.params.into_iter().map(MySqlParam::into_inner).collect();
        Params::Positional(mysql_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dates_survive_the_round_trip() {
        let zero = Value::Date(0, 0, 0, 0, 0, 0, 0);
        let wire = MySqlParam::from_value(&zero).into_inner();
        assert_eq!(wire, MySqlValue::Date(0, 0, 0, 0, 0, 0, 0));
        assert_eq!(to_value(wire), zero);
    }

    #[test]
    fn params_keep_positional_order() {
        let values = [Value::Int(1), Value::Null, Value::from("x")];
        match MySqlParamStore::from_values(values.iter()).params() {
            Params::Positional(v) => assert_eq!(
                v,
                vec![
                    MySqlValue::Int(1),
                    MySqlValue::NULL,
                    MySqlValue::Bytes(b"x".to_vec())
                ]
            ),
            other => panic!("unexpected params: {other:?}"),
        }
    }
}
