//! Closed enumerations for roles, statuses and categories
//!
//! Each enum serializes to its canonical Spanish spelling and parses
//! leniently: case, spacing, underscores and accents are ignored, and a few
//! English aliases are accepted. Anything else is rejected.

use crate::text::fold_key;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A status string that matches no variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    /// Enum being parsed
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $canon:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical persisted spelling
            #[inline]
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $canon, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key = fold_key(s);
                $(
                    if key == fold_key($canon) $(|| key == fold_key($alias))* {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownVariant { kind: $kind, value: s.to_string() })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_enum! {
    /// Account role
    Role as "role" {
        /// Property owner
        Arrendador => "Arrendador" | "landlord" | "propietario",
        /// Renter
        Inquilino => "Inquilino" | "tenant" | "arrendatario",
        /// Back-office operator
        Admin => "Admin" | "administrador",
    }
}

closed_enum! {
    /// Availability of a property
    PropertyStatus as "property status" {
        /// Can be offered in a new contract
        Disponible => "Disponible" | "available",
        /// Bound by an active contract
        Arrendada => "Arrendada" | "arrendado" | "rented" | "ocupada",
        /// Temporarily withdrawn by the owner
        Mantenimiento => "Mantenimiento" | "maintenance",
    }
}

closed_enum! {
    /// Kind of property
    PropertyKind as "property kind" {
        /// House
        Casa => "Casa" | "house",
        /// Apartment
        Departamento => "Departamento" | "depto" | "apartment",
        /// Office
        Oficina => "Oficina" | "office",
        /// Retail unit
        Local => "Local" | "local comercial",
        /// Storage unit
        Bodega => "Bodega" | "storage",
        /// Land lot
        Terreno => "Terreno" | "parcela" | "land",
        /// Anything else
        Otro => "Otro" | "other",
    }
}

closed_enum! {
    /// Contract lifecycle status
    ContractStatus as "contract status" {
        /// Awaiting tenant decision
        Pendiente => "Pendiente" | "pending",
        /// Approved and running
        Activo => "Activo" | "activa" | "active",
        /// Declined by the tenant
        Rechazado => "Rechazado" | "rechazada" | "rejected",
        /// Withdrawn by the landlord before approval
        Cancelado => "Cancelado" | "cancelada" | "cancelled",
        /// Ended by the landlord
        Finalizado => "Finalizado" | "finalizada" | "terminado" | "finished",
    }
}

closed_enum! {
    /// Review status of a declared payment
    PaymentStatus as "payment status" {
        /// Declared, awaiting landlord review
        Pendiente => "Pendiente" | "pending",
        /// Confirmed by the landlord
        Aceptado => "Aceptado" | "aceptada" | "accepted",
        /// Refused by the landlord
        Rechazado => "Rechazado" | "rechazada" | "rejected",
    }
}

closed_enum! {
    /// How a payment was made
    PaymentMethod as "payment method" {
        /// Bank transfer
        Transferencia => "Transferencia" | "transfer",
        /// Bank deposit
        Deposito => "Deposito" | "deposit",
        /// Cash
        Efectivo => "Efectivo" | "cash",
        /// Anything else
        Otro => "Otro" | "other",
    }
}

closed_enum! {
    /// Incident handling status
    IncidentStatus as "incident status" {
        /// Reported, not yet handled
        Pendiente => "Pendiente" | "pending" | "abierto",
        /// Landlord is working on it
        EnProceso => "EnProceso" | "en progreso" | "in progress",
        /// Closed
        Resuelto => "Resuelto" | "resuelta" | "resolved",
    }
}

closed_enum! {
    /// Incident urgency
    IncidentPriority as "incident priority" {
        /// Can wait
        Baja => "Baja" | "low",
        /// Normal
        Media => "Media" | "medium",
        /// Urgent
        Alta => "Alta" | "high" | "urgente",
    }
}

closed_enum! {
    /// Tenant evaluation status
    EvaluationStatus as "evaluation status" {
        /// Owed by the landlord
        Pendiente => "Pendiente" | "pending",
        /// Scores submitted
        Completada => "Completada" | "completado" | "completed",
    }
}

closed_enum! {
    /// Invitation status
    InvitationStatus as "invitation status" {
        /// Email sent, not yet accepted
        Enviada => "Enviada" | "sent",
        /// Invited tenant registered
        Aceptada => "Aceptada" | "accepted",
        /// Past its expiry date
        Expirada => "Expirada" | "expired",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_casing() {
        assert_eq!("Activo".parse::<ContractStatus>().unwrap(), ContractStatus::Activo);
        assert_eq!("activo".parse::<ContractStatus>().unwrap(), ContractStatus::Activo);
        assert_eq!(" ACTIVO ".parse::<ContractStatus>().unwrap(), ContractStatus::Activo);
        assert_eq!("disponible".parse::<PropertyStatus>().unwrap(), PropertyStatus::Disponible);
    }

    #[test]
    fn parses_spaced_variants() {
        assert_eq!("en proceso".parse::<IncidentStatus>().unwrap(), IncidentStatus::EnProceso);
        assert_eq!("EN_PROCESO".parse::<IncidentStatus>().unwrap(), IncidentStatus::EnProceso);
    }

    #[test]
    fn rejects_unknown() {
        let err = "archivado".parse::<ContractStatus>().unwrap_err();
        assert_eq!(err.kind, "contract status");
        assert!(err.to_string().contains("archivado"));
    }

    #[test]
    fn serializes_canonical_spelling() {
        let json = serde_json::to_string(&IncidentStatus::EnProceso).unwrap();
        assert_eq!(json, "\"EnProceso\"");
        let back: IncidentStatus = serde_json::from_str("\"en proceso\"").unwrap();
        assert_eq!(back, IncidentStatus::EnProceso);
    }

    #[test]
    fn role_aliases() {
        assert_eq!("landlord".parse::<Role>().unwrap(), Role::Arrendador);
        assert_eq!("inquilino".parse::<Role>().unwrap(), Role::Inquilino);
    }

    #[test]
    fn all_lists_every_variant() {
        assert_eq!(ContractStatus::ALL.len(), 5);
        for status in ContractStatus::ALL {
            assert_eq!(status.as_str().parse::<ContractStatus>().unwrap(), *status);
        }
    }
}
