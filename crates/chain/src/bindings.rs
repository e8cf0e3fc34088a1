//! ABI bindings for the protocol contracts and the Celo system contracts this workspace talks to.
//!
//! Only the methods the orchestration actually calls are declared. Calls returning a single value
//! decode to that value; multi-value returns are named so the generated structs have readable
//! fields.

#![allow(missing_docs)]

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IDefaultStrategy {
        function getNumberOfGroups() external view returns (uint256 count);
        function getGroupsHead() external view returns (address head, address previousAddress);
        function getGroupPreviousAndNext(address group)
            external
            view
            returns (address previousAddress, address nextAddress);
    }
}

sol! {
    #[sol(rpc)]
    interface ISpecificGroupStrategy {
        function getNumberOfStrategies() external view returns (uint256 count);
        function getStrategy(uint256 index) external view returns (address group);
        function getNumberOfVotedGroups() external view returns (uint256 count);
        function getVotedGroup(uint256 index) external view returns (address group);
    }
}

sol! {
    #[sol(rpc)]
    interface IAccount {
        function scheduledVotesForGroup(address group) external view returns (uint256 amount);
        function scheduledWithdrawalsForGroupAndBeneficiary(address group, address beneficiary)
            external
            view
            returns (uint256 amount);
        function scheduledRevokeForGroup(address group) external view returns (uint256 amount);
        function votesForGroup(address group) external view returns (uint256 amount);
        function getNumberPendingWithdrawals(address beneficiary)
            external
            view
            returns (uint256 count);
        function getPendingWithdrawals(address beneficiary)
            external
            view
            returns (uint256[] values, uint256[] timestamps);

        function activateAndVote(address group, address lesser, address greater) external;
        function revokeVotes(
            address group,
            address lesserAfterPendingRevoke,
            address greaterAfterPendingRevoke,
            address lesserAfterActiveRevoke,
            address greaterAfterActiveRevoke,
            uint256 index
        ) external;
        function withdraw(
            address beneficiary,
            address group,
            address lesserAfterPendingRevoke,
            address greaterAfterPendingRevoke,
            address lesserAfterActiveRevoke,
            address greaterAfterActiveRevoke,
            uint256 index
        ) external;
        function finishPendingWithdrawal(
            address beneficiary,
            uint256 localPendingWithdrawalIndex,
            uint256 lockedGoldPendingWithdrawalIndex
        ) external returns (uint256 amount);
    }
}

sol! {
    #[sol(rpc)]
    interface IElection {
        function hasActivatablePendingVotes(address account, address group)
            external
            view
            returns (bool activatable);
        function getPendingVotesForGroupByAccount(address group, address account)
            external
            view
            returns (uint256 votes);
        function getActiveVotesForGroupByAccount(address group, address account)
            external
            view
            returns (uint256 votes);
        function getTotalVotesForEligibleValidatorGroups()
            external
            view
            returns (address[] groups, uint256[] values);
        function getGroupsVotedForByAccount(address account)
            external
            view
            returns (address[] groups);
    }
}

sol! {
    #[sol(rpc)]
    interface ILockedGold {
        function getPendingWithdrawals(address account)
            external
            view
            returns (uint256[] values, uint256[] timestamps);
    }
}

sol! {
    #[sol(rpc)]
    interface IRegistry {
        function getAddressForStringOrDie(string identifier)
            external
            view
            returns (address registered);
    }
}

sol! {
    #[sol(rpc)]
    interface IMultiSig {
        event ProposalAdded(uint256 indexed proposalId);

        function submitProposal(
            address[] destinations,
            uint256[] values,
            bytes[] payloads
        ) external returns (uint256 proposalId);
        function confirmProposal(uint256 proposalId) external;
        function revokeConfirmation(uint256 proposalId) external;
        function scheduleProposal(uint256 proposalId) external;
        function executeProposal(uint256 proposalId) external;

        function isFullyConfirmed(uint256 proposalId) external view returns (bool confirmed);
        function isScheduled(uint256 proposalId) external view returns (bool scheduled);
        function isProposalTimelockReached(uint256 proposalId)
            external
            view
            returns (bool reached);
        function getOwners() external view returns (address[] owners);
        function getConfirmations(uint256 proposalId)
            external
            view
            returns (address[] confirmations);
        function isConfirmedBy(uint256 proposalId, address owner)
            external
            view
            returns (bool confirmed);
        function isOwner(address owner) external view returns (bool result);
    }
}
